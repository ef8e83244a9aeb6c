//! Browser binding
//!
//! When the crate runs as WebAssembly next to the JavaScript clustering
//! library, `JsChannel` calls `globalThis[namespace][command](...args)` and
//! awaits the returned promise. The page reports interactions back through
//! the exported `markerclusterNotify(target, method, payloadJson)`.

use async_trait::async_trait;
use futures::channel::oneshot;
use js_sys::{Array, Function, Promise, Reflect, JSON};
use serde_json::Value;
use std::sync::OnceLock;
use wasm_bindgen::{prelude::*, JsCast};
use wasm_bindgen_futures::JsFuture;

use crate::{
    boundary::{BoundaryChannel, InboundRouter, InboundTarget},
    core::{constants::DEFAULT_JS_NAMESPACE, id::ClusterId},
    prelude::Weak,
    ClusterError, Result,
};

static ROUTER: OnceLock<InboundRouter> = OnceLock::new();

fn router() -> &'static InboundRouter {
    ROUTER.get_or_init(InboundRouter::new)
}

/// Channel backed by functions on a global JS object
pub struct JsChannel {
    namespace: String,
}

impl JsChannel {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl Default for JsChannel {
    fn default() -> Self {
        Self::new(DEFAULT_JS_NAMESPACE)
    }
}

fn describe(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| JSON::stringify(err).ok().and_then(|s| s.as_string()))
        .unwrap_or_else(|| "unknown JavaScript error".to_string())
}

fn to_js(value: &Value) -> Result<JsValue> {
    JSON::parse(&serde_json::to_string(value)?)
        .map_err(|e| ClusterError::InvalidArgument(describe(&e)))
}

fn from_js(value: &JsValue) -> Result<Value> {
    if value.is_undefined() || value.is_null() {
        return Ok(Value::Null);
    }
    let text = JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .unwrap_or_else(|| "null".to_string());
    Ok(serde_json::from_str(&text)?)
}

async fn call_js(namespace: &str, command: &str, args: Vec<Value>) -> Result<Value> {
    let unavailable = |e: JsValue| ClusterError::BoundaryUnavailable(describe(&e));

    let ns = Reflect::get(&js_sys::global(), &JsValue::from_str(namespace)).map_err(unavailable)?;
    if ns.is_undefined() || ns.is_null() {
        return Err(ClusterError::BoundaryUnavailable(format!(
            "{} is not loaded",
            namespace
        )));
    }
    let function = Reflect::get(&ns, &JsValue::from_str(command))
        .map_err(unavailable)?
        .dyn_into::<Function>()
        .map_err(|_| {
            ClusterError::BoundaryUnavailable(format!("{}.{} is not a function", namespace, command))
        })?;

    let js_args = Array::new();
    for arg in &args {
        js_args.push(&to_js(arg)?);
    }

    let rejected = |e: JsValue| ClusterError::RemoteRejected(describe(&e));
    let returned = function.apply(&ns, &js_args).map_err(rejected)?;
    let settled = if returned.is_instance_of::<Promise>() {
        JsFuture::from(Promise::from(returned))
            .await
            .map_err(rejected)?
    } else {
        returned
    };

    from_js(&settled)
}

#[async_trait]
impl BoundaryChannel for JsChannel {
    async fn invoke(&self, command: &str, args: Vec<Value>) -> Result<Value> {
        // JS values are not Send; run the call on the local executor and hand
        // back only the JSON result.
        let (tx, rx) = oneshot::channel();
        let namespace = self.namespace.clone();
        let command = command.to_string();
        log::debug!("-> {}.{}", namespace, command);
        wasm_bindgen_futures::spawn_local(async move {
            let _ = tx.send(call_js(&namespace, &command, args).await);
        });

        rx.await.unwrap_or_else(|_| {
            Err(ClusterError::BoundaryUnavailable(
                "JavaScript call was dropped".into(),
            ))
        })
    }

    fn is_open(&self) -> bool {
        Reflect::get(&js_sys::global(), &JsValue::from_str(&self.namespace))
            .map(|ns| !ns.is_undefined() && !ns.is_null())
            .unwrap_or(false)
    }

    fn register_inbound(&self, id: &ClusterId, target: Weak<dyn InboundTarget>) {
        router().register(id, target);
    }

    fn unregister_inbound(&self, id: &ClusterId, target: &Weak<dyn InboundTarget>) {
        router().unregister_if(id, target);
    }
}

/// Entry point for the page: deliver `method` with a JSON payload to the
/// cluster registered as `target`.
#[wasm_bindgen(js_name = markerclusterNotify)]
pub fn markercluster_notify(
    target: &str,
    method: &str,
    payload_json: &str,
) -> std::result::Result<(), JsValue> {
    let payload: Value =
        serde_json::from_str(payload_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    router()
        .dispatch(&ClusterId::from_raw(target), method, payload)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}
