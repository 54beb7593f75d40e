//! Route dispatch
//!
//! Maps method+path onto exactly one capability call and translates the
//! outcome into a status code: parameter problems are 400, capability
//! failures are 500, unknown paths are 404, and every route answers 501
//! while no capability provider is attached.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use crate::capture::{SessionPreset, WhiteBalanceMode};
use crate::control::capability::ControlCapabilities;
use crate::control::http::{Method, Request, Response};
use crate::error::{EngineError, Result};
use crate::render::BokehParams;

/// Dispatch one request
pub async fn dispatch(
    capabilities: Option<Arc<dyn ControlCapabilities>>,
    request: &Request,
) -> Response {
    let Some(caps) = capabilities else {
        return Response::empty(501);
    };

    match (request.method, request.path.as_str()) {
        (Method::Get, "/cameras") => json_or_500(&caps.camera_profiles()),
        (Method::Get, "/cameras/active") => json_or_500(&caps.active_camera()),
        (Method::Post, "/cameras/select") => {
            let form = request.form();
            completed(
                require_str(&form, "uniqueID")
                    .and_then(|unique_id| caps.select_camera(unique_id)),
            )
        }

        (Method::Post, "/camera/zoom") => {
            let form = request.form();
            completed(require_f64(&form, "zoomFactor").and_then(|factor| caps.set_zoom(factor)))
        }
        (Method::Post, "/camera/exposure/bias") => {
            let form = request.form();
            completed(require_f64(&form, "bias").and_then(|bias| caps.set_exposure_bias(bias)))
        }

        (Method::Get, "/camera/white-balance/mode/auto") => {
            completed(caps.set_white_balance_mode(WhiteBalanceMode::ContinuousAuto))
        }
        (Method::Get, "/camera/white-balance/mode/locked") => {
            completed(caps.set_white_balance_mode(WhiteBalanceMode::Locked))
        }
        (Method::Get, "/camera/white-balance/temp-tint") => {
            let reading = caps.white_balance();
            Response::json(
                200,
                json!({
                    "temperature": reading.temperature,
                    "tint": reading.tint,
                })
                .to_string(),
            )
        }
        (Method::Post, "/camera/white-balance/temp-tint") => {
            let form = request.form();
            let gains = require_f64(&form, "temperature")
                .and_then(|temperature| Ok((temperature, require_f64(&form, "tint")?)));
            completed(gains.and_then(|(temperature, tint)| {
                caps.set_white_balance_temp_tint(temperature, tint)
            }))
        }
        (Method::Get, "/camera/white-balance/grey") => completed(caps.lock_grey_white_balance()),

        (Method::Post, "/camera/focus") => {
            let form = request.form();
            let point = require_f64(&form, "x").and_then(|x| Ok((x, require_f64(&form, "y")?)));
            completed(point.and_then(|(x, y)| caps.set_focus_point(x, y)))
        }
        (Method::Post, "/camera/framerate") => {
            let form = request.form();
            completed(require_f64(&form, "fps").and_then(|fps| caps.set_frame_rate(fps)))
        }

        (Method::Get, "/ndi/status") => Response::json(
            200,
            json!({ "started": caps.streaming_started() }).to_string(),
        ),
        (Method::Get, "/ndi/start") => {
            caps.user_start_streaming();
            Response::ok()
        }
        (Method::Get, "/ndi/stop") => {
            caps.user_stop_streaming();
            Response::ok()
        }

        (Method::Get, "/recording/start") => {
            let caps = Arc::clone(&caps);
            run_blocking(move || caps.start_recording().map(|()| Response::ok())).await
        }
        (Method::Get, "/recording/stop") => {
            let caps = Arc::clone(&caps);
            run_blocking(move || {
                caps.stop_recording().map(|path| {
                    Response::json(
                        200,
                        json!({ "absoluteUrl": path.display().to_string() }).to_string(),
                    )
                })
            })
            .await
        }

        (Method::Get, "/audio/inputs") => match caps.audio_inputs() {
            Ok(inputs) => json_or_500(&inputs),
            Err(e) => error_response(&e),
        },
        (Method::Get, "/audio/inputs/current") => match caps.current_audio_input() {
            Ok(Some(input)) => json_or_500(&input),
            Ok(None) => Response::empty(404),
            Err(e) => error_response(&e),
        },
        (Method::Post, "/audio/inputs/current") => {
            let form = request.form();
            created(require_str(&form, "uid").and_then(|uid| caps.select_audio_input(uid)))
        }
        (Method::Get, "/audio/outputs") => match caps.audio_outputs() {
            Ok(outputs) => json_or_500(&outputs),
            Err(e) => error_response(&e),
        },
        (Method::Get, "/audio/outputs/current") => match caps.current_audio_output() {
            Ok(Some(output)) => json_or_500(&output),
            Ok(None) => Response::empty(404),
            Err(e) => error_response(&e),
        },

        (Method::Post, "/filters/bokeh") => {
            let form = request.form();
            created(parse_bokeh(&form).and_then(|params| caps.set_bokeh(params)))
        }

        (Method::Get, path) if path.starts_with("/preset/") => {
            let label = &path["/preset/".len()..];
            match SessionPreset::from_label(label) {
                Some(preset) => completed(caps.set_preset(preset)),
                None => error_response(&EngineError::UnsupportedCapability(format!(
                    "preset {label}"
                ))),
            }
        }

        _ => Response::empty(404),
    }
}

fn parse_bokeh(form: &HashMap<String, String>) -> Result<Option<BokehParams>> {
    let enabled = form.get("enabled").map(|v| v != "false").unwrap_or(true);
    if !enabled {
        return Ok(None);
    }
    let radius = require_f64(form, "radius")?;
    let brightness = require_f64(form, "brightness")?;
    Ok(Some(BokehParams { radius, brightness }))
}

async fn run_blocking<F>(operation: F) -> Response
where
    F: FnOnce() -> Result<Response> + Send + 'static,
{
    match tokio::task::spawn_blocking(operation).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            tracing::error!(error = %e, "blocking capability task failed");
            Response::empty(500)
        }
    }
}

fn completed(result: Result<()>) -> Response {
    match result {
        Ok(()) => Response::ok(),
        Err(e) => error_response(&e),
    }
}

fn created(result: Result<()>) -> Response {
    match result {
        Ok(()) => Response::empty(201),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &EngineError) -> Response {
    let status = if error.is_malformed() { 400 } else { 500 };
    tracing::debug!(error = %error, status, "request failed");
    Response::empty(status)
}

fn json_or_500<T: serde::Serialize>(value: &T) -> Response {
    match serde_json::to_string(value) {
        Ok(body) => Response::json(200, body),
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            Response::empty(500)
        }
    }
}

fn require_str<'a>(form: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    form.get(name)
        .map(String::as_str)
        .ok_or_else(|| EngineError::RequestMalformed(format!("missing parameter {name}")))
}

fn require_f64(form: &HashMap<String, String>, name: &str) -> Result<f64> {
    require_str(form, name)?
        .parse()
        .map_err(|_| EngineError::RequestMalformed(format!("invalid numeric parameter {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioDeviceInfo;
    use crate::capture::{WhiteBalanceMode, WhiteBalanceReading};
    use crate::profile::{DeviceProfile, DeviceProperties};
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockCapabilities {
        calls: Mutex<Vec<String>>,
        zoom: Mutex<f64>,
        streaming: Mutex<bool>,
        bokeh: Mutex<Option<BokehParams>>,
    }

    impl MockCapabilities {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ControlCapabilities for MockCapabilities {
        fn camera_profiles(&self) -> Vec<DeviceProfile> {
            vec![DeviceProfile {
                properties: DeviceProperties {
                    unique_id: "cam-0".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            }]
        }

        fn active_camera(&self) -> DeviceProfile {
            DeviceProfile::default()
        }

        fn select_camera(&self, unique_id: &str) -> Result<()> {
            self.record(format!("select:{unique_id}"));
            Ok(())
        }

        fn set_zoom(&self, factor: f64) -> Result<()> {
            if factor > 16.0 {
                return Err(EngineError::UnsupportedCapability(
                    "zoom out of range".to_string(),
                ));
            }
            *self.zoom.lock().unwrap() = factor;
            Ok(())
        }

        fn set_exposure_bias(&self, bias: f64) -> Result<()> {
            self.record(format!("bias:{bias}"));
            Ok(())
        }

        fn white_balance(&self) -> WhiteBalanceReading {
            WhiteBalanceReading {
                mode: WhiteBalanceMode::ContinuousAuto,
                temperature: 5600.0,
                tint: 10.0,
            }
        }

        fn set_white_balance_mode(&self, mode: WhiteBalanceMode) -> Result<()> {
            self.record(format!("wb-mode:{}", mode.label()));
            Ok(())
        }

        fn set_white_balance_temp_tint(&self, temperature: f64, tint: f64) -> Result<()> {
            self.record(format!("wb:{temperature}/{tint}"));
            Ok(())
        }

        fn lock_grey_white_balance(&self) -> Result<()> {
            self.record("wb-grey");
            Ok(())
        }

        fn set_focus_point(&self, x: f64, y: f64) -> Result<()> {
            self.record(format!("focus:{x}/{y}"));
            Ok(())
        }

        fn set_frame_rate(&self, fps: f64) -> Result<()> {
            self.record(format!("fps:{fps}"));
            Ok(())
        }

        fn set_preset(&self, preset: SessionPreset) -> Result<()> {
            self.record(format!("preset:{}", preset.label()));
            Ok(())
        }

        fn streaming_started(&self) -> bool {
            *self.streaming.lock().unwrap()
        }

        fn user_start_streaming(&self) {
            *self.streaming.lock().unwrap() = true;
        }

        fn user_stop_streaming(&self) {
            *self.streaming.lock().unwrap() = false;
        }

        fn start_recording(&self) -> Result<()> {
            self.record("rec-start");
            Ok(())
        }

        fn stop_recording(&self) -> Result<PathBuf> {
            self.record("rec-stop");
            Ok(PathBuf::from("/recordings/2026-01-01T00_00_00Z.cap"))
        }

        fn audio_inputs(&self) -> Result<Vec<AudioDeviceInfo>> {
            Ok(vec![AudioDeviceInfo {
                uid: "mic-0".to_string(),
                name: "Built-in Mic".to_string(),
                port_type: "builtin".to_string(),
            }])
        }

        fn current_audio_input(&self) -> Result<Option<AudioDeviceInfo>> {
            Ok(None)
        }

        fn select_audio_input(&self, uid: &str) -> Result<()> {
            self.record(format!("audio:{uid}"));
            Ok(())
        }

        fn audio_outputs(&self) -> Result<Vec<AudioDeviceInfo>> {
            Ok(Vec::new())
        }

        fn current_audio_output(&self) -> Result<Option<AudioDeviceInfo>> {
            Ok(None)
        }

        fn set_bokeh(&self, params: Option<BokehParams>) -> Result<()> {
            *self.bokeh.lock().unwrap() = params;
            Ok(())
        }
    }

    fn caps() -> (Arc<MockCapabilities>, Option<Arc<dyn ControlCapabilities>>) {
        let mock = Arc::new(MockCapabilities::default());
        let caps = Arc::clone(&mock) as Arc<dyn ControlCapabilities>;
        (mock, Some(caps))
    }

    fn get(path: &str) -> Request {
        Request {
            method: Method::Get,
            path: path.to_string(),
            content_type: None,
            body: Vec::new(),
        }
    }

    fn post(path: &str, body: &str) -> Request {
        Request {
            method: Method::Post,
            path: path.to_string(),
            content_type: Some("application/x-www-form-urlencoded".to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_unattached_returns_501() {
        let response = dispatch(None, &get("/cameras")).await;
        assert_eq!(response.status, 501);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404() {
        let (_mock, caps) = caps();
        let response = dispatch(caps, &get("/teleport")).await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_cameras_returns_json_array() {
        let (_mock, caps) = caps();
        let response = dispatch(caps, &get("/cameras")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.starts_with('['));
        assert!(body.contains("\"uniqueId\":\"cam-0\""));
    }

    #[tokio::test]
    async fn test_zoom_applies_factor() {
        let (mock, caps) = caps();
        let response = dispatch(caps, &post("/camera/zoom", "zoomFactor=2.5")).await;

        assert_eq!(response.status, 200);
        assert_eq!(*mock.zoom.lock().unwrap(), 2.5);
    }

    #[tokio::test]
    async fn test_zoom_missing_param_is_400() {
        let (mock, caps) = caps();
        let response = dispatch(caps, &post("/camera/zoom", "")).await;

        assert_eq!(response.status, 400);
        assert_eq!(*mock.zoom.lock().unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_zoom_non_numeric_is_400() {
        let (_mock, caps) = caps();
        let response = dispatch(caps, &post("/camera/zoom", "zoomFactor=huge")).await;

        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_zoom_out_of_range_is_500() {
        let (mock, caps) = caps();
        let response = dispatch(caps, &post("/camera/zoom", "zoomFactor=999")).await;

        assert_eq!(response.status, 500);
        assert_eq!(*mock.zoom.lock().unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_preset_route() {
        let (mock, caps) = caps();
        let response = dispatch(caps, &get("/preset/720p")).await;

        assert_eq!(response.status, 200);
        assert_eq!(mock.calls(), vec!["preset:720p"]);
    }

    #[tokio::test]
    async fn test_unsupported_preset_is_500() {
        let (mock, caps) = caps();
        let response = dispatch(caps, &get("/preset/8K")).await;

        assert_eq!(response.status, 500);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ndi_status_reflects_streaming() {
        let (mock, caps) = caps();

        let response = dispatch(caps.clone(), &get("/ndi/status")).await;
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            "{\"started\":false}"
        );

        mock.user_start_streaming();
        let response = dispatch(caps, &get("/ndi/status")).await;
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            "{\"started\":true}"
        );
    }

    #[tokio::test]
    async fn test_ndi_start_and_stop() {
        let (mock, caps) = caps();

        let response = dispatch(caps.clone(), &get("/ndi/start")).await;
        assert_eq!(response.status, 200);
        assert!(mock.streaming_started());

        let response = dispatch(caps, &get("/ndi/stop")).await;
        assert_eq!(response.status, 200);
        assert!(!mock.streaming_started());
    }

    #[tokio::test]
    async fn test_recording_stop_returns_path() {
        let (mock, caps) = caps();

        let response = dispatch(caps.clone(), &get("/recording/start")).await;
        assert_eq!(response.status, 200);

        let response = dispatch(caps, &get("/recording/stop")).await;
        assert_eq!(response.status, 200);
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("\"absoluteUrl\""));
        assert!(body.contains(".cap"));
        assert_eq!(mock.calls(), vec!["rec-start", "rec-stop"]);
    }

    #[tokio::test]
    async fn test_white_balance_routes() {
        let (mock, caps) = caps();

        dispatch(caps.clone(), &get("/camera/white-balance/mode/locked")).await;
        dispatch(
            caps.clone(),
            &post("/camera/white-balance/temp-tint", "temperature=4500&tint=5"),
        )
        .await;
        dispatch(caps.clone(), &get("/camera/white-balance/grey")).await;

        assert_eq!(mock.calls(), vec!["wb-mode:locked", "wb:4500/5", "wb-grey"]);

        let response = dispatch(caps, &get("/camera/white-balance/temp-tint")).await;
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("\"temperature\":5600.0"));
        assert!(body.contains("\"tint\":10.0"));
    }

    #[tokio::test]
    async fn test_audio_input_select_is_201() {
        let (mock, caps) = caps();
        let response = dispatch(caps, &post("/audio/inputs/current", "uid=mic-0")).await;

        assert_eq!(response.status, 201);
        assert_eq!(mock.calls(), vec!["audio:mic-0"]);
    }

    #[tokio::test]
    async fn test_bokeh_update_is_201() {
        let (mock, caps) = caps();
        let response = dispatch(
            caps.clone(),
            &post("/filters/bokeh", "radius=8&brightness=1.2"),
        )
        .await;

        assert_eq!(response.status, 201);
        assert_eq!(mock.bokeh.lock().unwrap().map(|p| p.radius), Some(8.0));

        let response = dispatch(caps, &post("/filters/bokeh", "enabled=false")).await;
        assert_eq!(response.status, 201);
        assert!(mock.bokeh.lock().unwrap().is_none());
    }
}
