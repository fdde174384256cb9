//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to a `external fun` declaration
//! in RustBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.
//!
//! The Kotlin side holds an opaque `Long` handle from `create` and must
//! pass it back to every call until `destroy`. Fallible calls return
//! null on success and an error message otherwise.

use std::ptr;

use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{jboolean, jdouble, jint, jlong, jstring, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::NavConfig;
use crate::engine::{NavPhase, NavigationStatus};
use crate::error::{NavError, Result};
use crate::geo::GeoPoint;
use crate::navigator::Navigator;
use crate::source::LiveHandle;
use crate::{directions, gpx, instructions};

struct Bridge {
    navigator: Navigator,
    live: Option<LiveHandle>,
}

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    phase: NavPhase,
    status: Option<NavigationStatus>,
    last_sample_age_ms: Option<u128>,
    source_failure: Option<String>,
}

/// Borrow the bridge behind a handle from `create`.
///
/// # Safety
/// `handle` must be zero or a live value returned by `create`.
unsafe fn bridge<'a>(handle: jlong) -> Option<&'a Mutex<Bridge>> {
    // SAFETY: caller guarantees the pointer came from Box::into_raw in create
    unsafe { (handle as *const Mutex<Bridge>).as_ref() }
}

fn to_jstring(env: &mut JNIEnv, text: &str) -> jstring {
    env.new_string(text)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

fn error_or_null(env: &mut JNIEnv, result: Result<()>) -> jstring {
    match result {
        Ok(()) => ptr::null_mut(),
        Err(e) => {
            log::warn!("Bridge call failed: {e}");
            to_jstring(env, &e.to_string())
        }
    }
}

fn read_string(env: &mut JNIEnv, value: &JString) -> Result<String> {
    env.get_string(value)
        .map(String::from)
        .map_err(|e| NavError::Parse(format!("invalid Java string: {e}")))
}

fn with_bridge<T>(handle: jlong, f: impl FnOnce(&mut Bridge) -> Result<T>) -> Result<T> {
    // SAFETY: handles only ever come from create and are released by destroy
    let bridge = unsafe { bridge(handle) }.ok_or(NavError::EngineStopped)?;
    f(&mut bridge.lock())
}

/// Returns the library version.
/// Maps to: RustBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_version(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    to_jstring(&mut env, crate::VERSION)
}

/// Creates a navigator from a JSON config (empty string for defaults).
/// Maps to: RustBridge.create(configJson: String) -> Long
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_create(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jlong {
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("velonav"),
    );

    let created = read_string(&mut env, &config_json).and_then(|json| {
        let config = if json.trim().is_empty() {
            NavConfig::default()
        } else {
            NavConfig::from_json(&json)?
        };
        Navigator::new(config)
    });

    match created {
        Ok(navigator) => {
            let bridge = Box::new(Mutex::new(Bridge {
                navigator,
                live: None,
            }));
            Box::into_raw(bridge) as jlong
        }
        Err(e) => {
            log::error!("Failed to create navigator: {e}");
            let _ = env.throw_new("java/lang/IllegalArgumentException", e.to_string());
            0
        }
    }
}

/// Releases a handle. Safe to call with 0.
/// Maps to: RustBridge.destroy(handle: Long)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_destroy(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if handle != 0 {
        // SAFETY: handle came from Box::into_raw in create and is not used again
        drop(unsafe { Box::from_raw(handle as *mut Mutex<Bridge>) });
    }
}

/// Starts navigation on one route of a directions response.
/// Maps to: RustBridge.startDirections(handle: Long, json: String, index: Int) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_startDirections(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    json: JString,
    index: jint,
) -> jstring {
    let result = read_string(&mut env, &json).and_then(|json| {
        let index = usize::try_from(index)
            .map_err(|_| NavError::Parse(format!("negative route index {index}")))?;
        let route = directions::select_route(&json, index)?;
        with_bridge(handle, |b| {
            b.live = None;
            b.navigator.start(route)
        })
    });
    error_or_null(&mut env, result)
}

/// Starts navigation along the first route (or track) of a GPX file.
/// Maps to: RustBridge.startGpx(handle: Long, data: ByteArray) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_startGpx(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    data: JByteArray,
) -> jstring {
    let result = env
        .convert_byte_array(&data)
        .map_err(|e| NavError::Parse(format!("invalid byte array: {e}")))
        .and_then(|bytes| {
            let gpx = gpx::parse_bytes(&bytes)?;
            let path = gpx
                .navigable_path()
                .ok_or_else(|| NavError::MalformedRoute("GPX has no route or track".into()))?;
            let route = instructions::route_from_polyline(&path.points)?;
            with_bridge(handle, |b| {
                b.live = None;
                b.navigator.start(route)
            })
        });
    error_or_null(&mut env, result)
}

/// Stops navigation and the active position source.
/// Maps to: RustBridge.stop(handle: Long)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_stop(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    let _ = with_bridge(handle, |b| {
        b.live = None;
        b.navigator.stop();
        Ok(())
    });
}

/// Switches to live location fixes delivered by pushLocation.
/// Maps to: RustBridge.useLiveSource(handle: Long) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_useLiveSource(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let result = with_bridge(handle, |b| {
        b.live = Some(b.navigator.use_live()?);
        Ok(())
    });
    error_or_null(&mut env, result)
}

/// Switches to replaying the active route.
/// Maps to: RustBridge.useReplaySource(handle: Long) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_useReplaySource(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let result = with_bridge(handle, |b| {
        b.live = None;
        b.navigator.use_replay()
    });
    error_or_null(&mut env, result)
}

/// Delivers a location fix from the foreground watcher or background task.
/// Returns false when the fix was filtered or no live source is active.
/// Maps to: RustBridge.pushLocation(handle: Long, lon: Double, lat: Double, timeMs: Long) -> Boolean
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_pushLocation(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
    lon: jdouble,
    lat: jdouble,
    time_ms: jlong,
) -> jboolean {
    // Clone the handle so delivery does not hold the bridge lock
    let live = with_bridge(handle, |b| b.live.clone().ok_or(NavError::SourceStopped));
    let accepted = live.and_then(|live| {
        live.deliver(GeoPoint::new(lon, lat), u64::try_from(time_ms).unwrap_or(0))
    });
    match accepted {
        Ok(true) => JNI_TRUE,
        Ok(false) => JNI_FALSE,
        Err(e) => {
            log::debug!("Location fix dropped: {e}");
            JNI_FALSE
        }
    }
}

/// Latest navigation status as JSON.
/// Maps to: RustBridge.status(handle: Long) -> String?
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_velonav_app_RustBridge_status(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let report = with_bridge(handle, |b| {
        let nav = &b.navigator;
        let report = StatusReport {
            phase: nav.phase(),
            status: nav.status(),
            last_sample_age_ms: nav.last_sample_age().map(|d| d.as_millis()),
            source_failure: nav.source_failure(),
        };
        Ok(serde_json::to_string(&report)?)
    });
    match report {
        Ok(json) => to_jstring(&mut env, &json),
        Err(e) => {
            log::warn!("Status unavailable: {e}");
            ptr::null_mut()
        }
    }
}
