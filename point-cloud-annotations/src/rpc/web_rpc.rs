use bevy::prelude::*;
use constants::units::is_known_unit;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationDesc, AnnotationId, InsertionOptions};
use crate::engine::camera::{CameraPose, ViewportCamera};
use crate::error::{AnnotationError, MeasureError};
use crate::measure::{LengthUnit, MeasurePoint, PointAttributes};
use crate::tools::annotation::{
    AnnotationClickEvent, AnnotationState, CancelInsertionsEvent, StartInsertionEvent,
    source_space_pose,
};
use crate::tools::measure::{ChainId, ChainSummary, MeasureSettings, MeasureTool};
use crate::tools::tool_manager::{
    ClearToolEvent, ToolSelectionEvent, ToolSelectionSource, ToolType,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcError>,
    pub id: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// Resource managing bidirectional RPC communication between the frontend and Bevy.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the frontend without expecting response.
    pub fn send_notification(&mut self, method: &str, params: serde_json::Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Plugin establishing WebRPC communication layer for iframe-based deployment.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<WebRpcInterface>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                Update,
                (
                    process_incoming_messages,
                    handle_rpc_messages,
                    send_outgoing_messages,
                )
                    .chain(),
            );

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(mut commands: Commands) {
    use std::sync::Arc;
    use std::sync::Mutex;

    let message_queue: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let queue_clone = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();

            if message_str.contains("jsonrpc") {
                if let Ok(mut queue) = queue_clone.lock() {
                    queue.push(message_str);
                }
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    if let Some(window) = window() {
        if let Err(e) =
            window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
        {
            error!("Failed to register message listener: {:?}", e);
        }
    }

    // Ownership passes to JS so the listener outlives this system.
    closure.forget();
    commands.insert_resource(MessageQueue(message_queue));
}

/// Resource wrapping thread-safe message queue for WASM event handling.
#[derive(Resource)]
struct MessageQueue(std::sync::Arc<std::sync::Mutex<Vec<String>>>);

/// Event representing incoming RPC message from the frontend.
#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn process_incoming_messages(
    message_queue: Option<Res<MessageQueue>>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    let Some(queue_res) = message_queue else {
        return;
    };

    let messages = if let Ok(mut queue) = queue_res.0.lock() {
        std::mem::take(&mut *queue)
    } else {
        Vec::new()
    };

    for message_str in messages {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

/// Side effects a request asks for that belong to other systems.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcCommand {
    SelectTool(ToolType),
    ClearTool,
    StartInsertion(InsertionOptions),
    CancelInsertions,
    ClickAnnotation(AnnotationId),
}

/// Everything a request handler may read or change.
pub struct RpcContext<'a> {
    pub measure: &'a mut MeasureTool,
    pub settings: &'a MeasureSettings,
    pub annotations: &'a mut AnnotationState,
    /// Viewport camera in source space, used as the default annotation view.
    pub camera_pose: Option<CameraPose>,
    pub commands: Vec<RpcCommand>,
}

#[allow(clippy::too_many_arguments)]
fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut measure_tool: ResMut<MeasureTool>,
    settings: Res<MeasureSettings>,
    mut annotations: ResMut<AnnotationState>,
    viewport_camera: Res<ViewportCamera>,
    mut tool_events: EventWriter<ToolSelectionEvent>,
    mut clear_events: EventWriter<ClearToolEvent>,
    mut insertion_events: EventWriter<StartInsertionEvent>,
    mut cancel_events: EventWriter<CancelInsertionsEvent>,
    mut click_events: EventWriter<AnnotationClickEvent>,
) {
    for event in events.read() {
        let request = match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => request,
            Err(parse_error) => {
                warn!("Discarding malformed RPC message: {}", parse_error);
                continue;
            }
        };
        debug!("Processing RPC method: {}", request.method);

        let mut ctx = RpcContext {
            measure: &mut measure_tool,
            settings: &settings,
            annotations: &mut annotations,
            camera_pose: Some(source_space_pose(viewport_camera.pose())),
            commands: Vec::new(),
        };
        let response = handle_rpc_request(&request, &mut ctx);

        for command in ctx.commands {
            match command {
                RpcCommand::SelectTool(tool_type) => {
                    tool_events.write(ToolSelectionEvent {
                        tool_type,
                        source: ToolSelectionSource::Rpc,
                    });
                }
                RpcCommand::ClearTool => {
                    clear_events.write(ClearToolEvent {
                        source: ToolSelectionSource::Rpc,
                    });
                }
                RpcCommand::StartInsertion(options) => {
                    insertion_events.write(StartInsertionEvent { options });
                }
                RpcCommand::CancelInsertions => {
                    cancel_events.write(CancelInsertionsEvent);
                }
                RpcCommand::ClickAnnotation(annotation) => {
                    click_events.write(AnnotationClickEvent { annotation });
                }
            }
        }

        if let Some(response) = response {
            rpc_interface.queue_response(response);
        }
    }
}

/// Handle individual RPC request and generate response based on method.
///
/// Requests without an id are notifications: they are executed, but no
/// response is produced.
pub fn handle_rpc_request(request: &RpcRequest, ctx: &mut RpcContext) -> Option<RpcResponse> {
    let params = &request.params;
    let result = match request.method.as_str() {
        "tool_selection" => handle_tool_selection(params, ctx),
        "clear_tool" => {
            ctx.commands.push(RpcCommand::ClearTool);
            Ok(serde_json::json!({ "success": true }))
        }
        "cancel_insertions" => {
            ctx.commands.push(RpcCommand::CancelInsertions);
            Ok(serde_json::json!({ "success": true }))
        }
        "measure_start" => handle_measure_start(params, ctx),
        "measure_add_point" => handle_measure_add_point(params, ctx),
        "measure_remove_point" => handle_measure_remove_point(params, ctx),
        "measure_move_point" => handle_measure_move_point(params, ctx),
        "measure_configure" => handle_measure_configure(params, ctx),
        "measure_summary" => handle_measure_summary(params, ctx),
        "measure_delete" => handle_measure_delete(params, ctx),
        "annotation_start_insertion" => handle_annotation_start_insertion(params, ctx),
        "annotation_commit" => handle_annotation_commit(params, ctx),
        "annotation_list" => to_result(&ctx.annotations.summaries()),
        "annotation_click" => handle_annotation_click(params, ctx),
        "annotation_set_visible" => handle_annotation_set_visible(params, ctx),
        "annotation_trigger_action" => handle_annotation_trigger_action(params, ctx),
        "annotation_delete" => handle_annotation_delete(params, ctx),
        _ => {
            warn!("Unknown RPC method: {}", request.method);
            let id = request.id.clone()?;
            return Some(create_error_response(
                id,
                -32601,
                "Method not found",
                Some(serde_json::json!({"method": request.method})),
            ));
        }
    };

    let id = request.id.clone()?;
    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(error),
            id: Some(id),
        }),
    }
}

fn parse_params<P: DeserializeOwned>(params: &serde_json::Value) -> Result<P, RpcError> {
    let params = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

fn to_result<T: Serialize>(value: &T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

#[derive(Deserialize)]
struct ChainParams {
    chain: ChainId,
}

#[derive(Deserialize)]
struct AnnotationParams {
    annotation: u64,
}

fn chain_mut<'a>(
    ctx: &'a mut RpcContext,
    chain: ChainId,
) -> Result<&'a mut crate::measure::MeasurementChain, RpcError> {
    ctx.measure
        .chain_mut(chain)
        .ok_or_else(|| RpcError::invalid_params(&format!("Unknown chain: {}", chain)))
}

fn annotation_id(ctx: &RpcContext, raw: u64) -> Result<AnnotationId, RpcError> {
    let id = AnnotationId::from_raw(raw);
    if ctx.annotations.tree.contains(id) {
        Ok(id)
    } else {
        Err(AnnotationError::UnknownAnnotation.into())
    }
}

fn handle_tool_selection(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct ToolSelectionParams {
        tool: String,
    }

    let tool_params: ToolSelectionParams = parse_params(params)?;
    let tool_type = ToolType::from_string(&tool_params.tool)
        .ok_or_else(|| RpcError::invalid_params(&format!("Unknown tool: {}", tool_params.tool)))?;

    ctx.commands.push(RpcCommand::SelectTool(tool_type));
    info!("Tool selection event dispatched: {:?}", tool_type);

    Ok(serde_json::json!({
        "success": true,
        "active_tool": tool_type.to_string()
    }))
}

/// Partial overlay visibility; absent flags keep their current value.
#[derive(Deserialize, Default)]
#[serde(default)]
struct VisibilityPatch {
    distances: Option<bool>,
    angles: Option<bool>,
    height: Option<bool>,
    area: Option<bool>,
    coordinates: Option<bool>,
}

/// Partial chain configuration shared by `measure_start` and `measure_configure`.
#[derive(Deserialize, Default)]
#[serde(default)]
struct ConfigPatch {
    closed: Option<bool>,
    max_points: Option<usize>,
    unit: Option<String>,
    colour: Option<[f32; 4]>,
    visibility: VisibilityPatch,
}

impl ConfigPatch {
    fn apply(&self, config: &mut crate::measure::ChainConfig) -> Result<(), RpcError> {
        if let Some(unit) = &self.unit {
            if !is_known_unit(unit) {
                return Err(RpcError::invalid_params(&format!("Unknown unit: {}", unit)));
            }
            config.unit = LengthUnit::new(unit.clone());
        }
        if let Some(closed) = self.closed {
            config.closed = closed;
        }
        if let Some(max_points) = self.max_points {
            config.max_points = max_points;
        }
        if let Some([r, g, b, a]) = self.colour {
            config.colour = Color::srgba(r, g, b, a);
        }
        let v = &self.visibility;
        let show = &mut config.visibility;
        show.distances = v.distances.unwrap_or(show.distances);
        show.angles = v.angles.unwrap_or(show.angles);
        show.height = v.height.unwrap_or(show.height);
        show.area = v.area.unwrap_or(show.area);
        show.coordinates = v.coordinates.unwrap_or(show.coordinates);
        Ok(())
    }
}

fn handle_measure_start(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct StartParams {
        name: Option<String>,
        #[serde(flatten)]
        config: ConfigPatch,
    }

    let start: StartParams = parse_params(params)?;
    let mut config = ctx.settings.default_chain.clone();
    start.config.apply(&mut config)?;

    let chain = ctx.measure.start_chain(config, start.name);
    info!("Measurement chain {} started via RPC", chain);
    Ok(serde_json::json!({ "chain": chain }))
}

fn handle_measure_add_point(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct AddPointParams {
        chain: ChainId,
        position: Vec3,
        index: Option<usize>,
        #[serde(default)]
        attributes: PointAttributes,
    }

    let add: AddPointParams = parse_params(params)?;
    let point = MeasurePoint {
        position: add.position,
        attributes: add.attributes,
    };
    let index = chain_mut(ctx, add.chain)?.add_point(point, add.index)?;
    Ok(serde_json::json!({ "chain": add.chain, "index": index }))
}

fn handle_measure_remove_point(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct RemovePointParams {
        chain: ChainId,
        index: usize,
    }

    let remove: RemovePointParams = parse_params(params)?;
    let removed = chain_mut(ctx, remove.chain)?.remove_point(remove.index)?;
    Ok(serde_json::json!({
        "chain": remove.chain,
        "removed": removed.position.to_array(),
    }))
}

fn handle_measure_move_point(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct MovePointParams {
        chain: ChainId,
        index: usize,
        position: Vec3,
    }

    let moved: MovePointParams = parse_params(params)?;
    chain_mut(ctx, moved.chain)?.move_point(moved.index, moved.position)?;
    Ok(serde_json::json!({ "success": true }))
}

fn handle_measure_configure(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct ConfigureParams {
        chain: ChainId,
        #[serde(flatten)]
        config: ConfigPatch,
    }

    let configure: ConfigureParams = parse_params(params)?;
    let chain = chain_mut(ctx, configure.chain)?;

    // Validate on a copy so a rejected patch leaves the chain untouched.
    let mut config = chain.config().clone();
    configure.config.apply(&mut config)?;
    *chain.config_mut() = config;
    Ok(serde_json::json!({ "success": true }))
}

fn handle_measure_summary(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct SummaryParams {
        chain: Option<ChainId>,
    }

    let summary: SummaryParams = parse_params(params)?;
    match summary.chain {
        Some(chain) => {
            let summary = ctx
                .measure
                .summary(chain)
                .ok_or_else(|| RpcError::invalid_params(&format!("Unknown chain: {}", chain)))?;
            to_result(&summary)
        }
        None => {
            let all: Vec<ChainSummary> = ctx
                .measure
                .chains()
                .map(|(id, chain)| ChainSummary::from_chain(id, chain))
                .collect();
            to_result(&all)
        }
    }
}

fn handle_measure_delete(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    let ChainParams { chain } = parse_params(params)?;
    ctx.measure
        .delete_chain(chain)
        .ok_or_else(|| RpcError::invalid_params(&format!("Unknown chain: {}", chain)))?;
    info!("Measurement chain {} deleted via RPC", chain);
    Ok(serde_json::json!({ "success": true }))
}

fn handle_annotation_start_insertion(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    let options: InsertionOptions = parse_params(params)?;
    ctx.commands.push(RpcCommand::StartInsertion(options));
    Ok(serde_json::json!({ "success": true }))
}

fn handle_annotation_commit(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct CommitParams {
        parent: Option<u64>,
        #[serde(flatten)]
        annotation: AnnotationDesc,
    }

    let commit: CommitParams = parse_params(params)?;
    let parent = commit
        .parent
        .map(|raw| annotation_id(ctx, raw))
        .transpose()?;
    if commit.annotation.position.is_none() && ctx.annotations.pending_position.is_none() {
        return Err(RpcError::invalid_params(
            "Expected 'position' or a placed insertion marker",
        ));
    }

    let id = ctx
        .annotations
        .commit(parent, commit.annotation, ctx.camera_pose)?;
    info!("Annotation {:?} committed via RPC", id);
    Ok(serde_json::json!({ "annotation": id.to_raw() }))
}

fn handle_annotation_click(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    let AnnotationParams { annotation } = parse_params(params)?;
    let id = annotation_id(ctx, annotation)?;
    let has_view = ctx.annotations.tree.has_view(id)?;

    ctx.commands.push(RpcCommand::ClickAnnotation(id));
    Ok(serde_json::json!({ "annotation": annotation, "has_view": has_view }))
}

fn handle_annotation_set_visible(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct VisibleParams {
        annotation: u64,
        visible: bool,
    }

    let visible: VisibleParams = parse_params(params)?;
    let id = annotation_id(ctx, visible.annotation)?;
    ctx.annotations.tree.set_visible(id, visible.visible)?;
    Ok(serde_json::json!({ "success": true }))
}

fn handle_annotation_trigger_action(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    #[derive(Deserialize)]
    struct ActionParams {
        annotation: u64,
        action: usize,
    }

    let action: ActionParams = parse_params(params)?;
    let id = annotation_id(ctx, action.annotation)?;
    ctx.annotations.tree.trigger_action(id, action.action)?;
    Ok(serde_json::json!({ "success": true }))
}

fn handle_annotation_delete(
    params: &serde_json::Value,
    ctx: &mut RpcContext,
) -> Result<serde_json::Value, RpcError> {
    let AnnotationParams { annotation } = parse_params(params)?;
    let id = annotation_id(ctx, annotation)?;
    let removed = ctx.annotations.tree.dispose(id)?;
    Ok(serde_json::json!({ "removed": removed.len() }))
}

/// Create standardized error response with optional data payload.
fn create_error_response(
    id: serde_json::Value,
    code: i32,
    message: &str,
    data: Option<serde_json::Value>,
) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(RpcError {
            code,
            message: message.to_string(),
            data,
        }),
        id: Some(id),
    }
}

/// Send queued notifications and responses to the frontend.
fn send_outgoing_messages(mut rpc_interface: ResMut<WebRpcInterface>) {
    for notification in rpc_interface.outgoing_notifications.drain(..) {
        send_message_to_parent(&notification);
    }

    for response in rpc_interface.outgoing_responses.drain(..) {
        send_message_to_parent(&response);
    }
}

/// Send serialized message to parent window.
fn send_message_to_parent<T: Serialize>(message: &T) {
    #[cfg(target_arch = "wasm32")]
    {
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
    }
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}

impl From<MeasureError> for RpcError {
    fn from(error: MeasureError) -> Self {
        Self::invalid_params(&error.to_string())
    }
}

impl From<AnnotationError> for RpcError {
    fn from(error: AnnotationError) -> Self {
        Self::invalid_params(&error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixture {
        measure: MeasureTool,
        settings: MeasureSettings,
        annotations: AnnotationState,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                measure: MeasureTool::default(),
                settings: MeasureSettings::default(),
                annotations: AnnotationState::default(),
            }
        }

        fn call(&mut self, method: &str, params: serde_json::Value) -> (RpcResponse, Vec<RpcCommand>) {
            let request = RpcRequest {
                jsonrpc: "2.0".into(),
                method: method.into(),
                params,
                id: Some(json!(1)),
            };
            let mut ctx = RpcContext {
                measure: &mut self.measure,
                settings: &self.settings,
                annotations: &mut self.annotations,
                camera_pose: Some(CameraPose {
                    position: Vec3::new(0.0, -20.0, 10.0),
                    target: Vec3::ZERO,
                }),
                commands: Vec::new(),
            };
            let response = handle_rpc_request(&request, &mut ctx).unwrap();
            (response, ctx.commands)
        }

        fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
            let (response, _) = self.call(method, params);
            assert!(response.error.is_none(), "{method}: {:?}", response.error);
            response.result.unwrap()
        }

        fn error_code(&mut self, method: &str, params: serde_json::Value) -> i32 {
            let (response, _) = self.call(method, params);
            response.error.unwrap().code
        }
    }

    #[test]
    fn measure_round_trip_over_rpc() {
        let mut rpc = Fixture::new();
        let chain = rpc.ok("measure_start", json!({ "closed": false, "name": "kerb" }))["chain"]
            .as_u64()
            .unwrap();

        for p in [[0.0, 0.0, 0.0], [3.0, 4.0, 0.0], [3.0, 4.0, 2.0]] {
            rpc.ok("measure_add_point", json!({ "chain": chain, "position": p }));
        }
        rpc.ok(
            "measure_move_point",
            json!({ "chain": chain, "index": 2, "position": [3.0, 4.0, 5.0] }),
        );
        let removed = rpc.ok("measure_remove_point", json!({ "chain": chain, "index": 0 }));
        assert_eq!(removed["removed"], json!([0.0, 0.0, 0.0]));

        let summary = rpc.ok("measure_summary", json!({ "chain": chain }));
        assert_eq!(summary["name"], "kerb");
        assert_eq!(summary["total_length"], 5.0);
        assert_eq!(summary["vertical_extent"], 5.0);

        rpc.ok("measure_delete", json!({ "chain": chain }));
        assert_eq!(rpc.ok("measure_summary", json!({})), json!([]));
    }

    #[test]
    fn measure_errors_map_to_invalid_params() {
        let mut rpc = Fixture::new();
        let chain = rpc.ok("measure_start", json!({ "max_points": 1 }))["chain"].clone();

        rpc.ok("measure_add_point", json!({ "chain": chain, "position": [0, 0, 0] }));
        assert_eq!(
            rpc.error_code("measure_add_point", json!({ "chain": chain, "position": [1, 0, 0] })),
            -32602
        );
        assert_eq!(
            rpc.error_code("measure_remove_point", json!({ "chain": chain, "index": 4 })),
            -32602
        );
        assert_eq!(rpc.error_code("measure_delete", json!({ "chain": 99 })), -32602);
        assert_eq!(rpc.error_code("measure_add_point", json!({ "chain": chain })), -32602);
        assert_eq!(rpc.error_code("no_such_method", json!({})), -32601);
    }

    #[test]
    fn configure_rejects_unknown_units_without_side_effects() {
        let mut rpc = Fixture::new();
        let chain = rpc.ok("measure_start", json!({}))["chain"].as_u64().unwrap() as ChainId;

        assert_eq!(
            rpc.error_code(
                "measure_configure",
                json!({ "chain": chain, "unit": "furlong", "closed": false })
            ),
            -32602
        );
        assert!(rpc.measure.chain(chain).unwrap().config().closed);

        rpc.ok(
            "measure_configure",
            json!({ "chain": chain, "unit": "ft", "visibility": { "area": true } }),
        );
        let chain = rpc.measure.chain(chain).unwrap();
        assert_eq!(chain.config().unit.code, "ft");
        assert!(chain.config().visibility.area);
        assert!(chain.config().visibility.distances);
        assert!(chain.is_dirty());
    }

    #[test]
    fn tool_and_insertion_requests_queue_commands() {
        let mut rpc = Fixture::new();

        let (_, commands) = rpc.call("tool_selection", json!({ "tool": "measure" }));
        assert_eq!(commands, vec![RpcCommand::SelectTool(ToolType::Measure)]);

        let (_, commands) = rpc.call("annotation_start_insertion", json!({ "show_height": true }));
        assert_eq!(
            commands,
            vec![RpcCommand::StartInsertion(InsertionOptions {
                show_coordinates: false,
                show_height: true,
            })]
        );

        let (_, commands) = rpc.call("cancel_insertions", serde_json::Value::Null);
        assert_eq!(commands, vec![RpcCommand::CancelInsertions]);

        assert_eq!(rpc.error_code("tool_selection", json!({ "tool": "lasso" })), -32602);
    }

    #[test]
    fn annotations_over_rpc() {
        let mut rpc = Fixture::new();
        assert_eq!(
            rpc.error_code("annotation_commit", json!({ "title": "Nowhere" })),
            -32602
        );

        let parent = rpc.ok(
            "annotation_commit",
            json!({ "title": "Crossing", "position": [1.0, 2.0, 0.0] }),
        )["annotation"]
            .clone();
        let child = rpc.ok(
            "annotation_commit",
            json!({ "parent": parent, "title": "Ramp", "position": [1.5, 2.0, 0.0] }),
        )["annotation"]
            .clone();

        let list = rpc.ok("annotation_list", json!({}));
        assert_eq!(list.as_array().unwrap().len(), 2);
        assert_eq!(list[1]["parent"], parent);
        assert_eq!(list[1]["level"], 2);

        let (response, commands) = rpc.call("annotation_click", json!({ "annotation": child }));
        assert_eq!(response.result.unwrap()["has_view"], true);
        assert_eq!(commands.len(), 1);

        rpc.ok(
            "annotation_set_visible",
            json!({ "annotation": parent, "visible": false }),
        );
        let list = rpc.ok("annotation_list", json!({}));
        assert_eq!(list[0]["visible"], false);
        assert_eq!(list[1]["visible"], true);

        assert_eq!(
            rpc.error_code(
                "annotation_trigger_action",
                json!({ "annotation": parent, "action": 0 })
            ),
            -32602
        );

        let removed = rpc.ok("annotation_delete", json!({ "annotation": parent }));
        assert_eq!(removed["removed"], 2);
        assert_eq!(rpc.error_code("annotation_click", json!({ "annotation": child })), -32602);
    }

    #[test]
    fn notifications_get_no_response() {
        let mut fixture = Fixture::new();
        let request = RpcRequest {
            jsonrpc: "2.0".into(),
            method: "clear_tool".into(),
            params: serde_json::Value::Null,
            id: None,
        };
        let mut ctx = RpcContext {
            measure: &mut fixture.measure,
            settings: &fixture.settings,
            annotations: &mut fixture.annotations,
            camera_pose: None,
            commands: Vec::new(),
        };
        assert!(handle_rpc_request(&request, &mut ctx).is_none());
        assert_eq!(ctx.commands, vec![RpcCommand::ClearTool]);
    }
}
