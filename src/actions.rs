//! Action/Timer Registry: named directive lists with optional throttling
//! and timer arming.
//!
//! Throttle coalescing is first-wins: the first trigger inside a window
//! captures its actor/event and schedules the single deferred execution;
//! triggers landing while the window is open are dropped.

use serde_json::{json, Value};

use crate::dom::NodeId;
use crate::engine::Engine;
use crate::log::LogLevel;
use crate::scheduler::{TimerHandle, TimerTask};

#[derive(Debug)]
pub struct ActionRecord {
    pub(crate) directives: Value,
    /// Throttle operand, resolved through the Value Resolver at trigger
    /// time so tray/event references stay live.
    pub(crate) throttle: Value,
    pub(crate) timer: Option<TimerHandle>,
    pub(crate) repeating: bool,
    pub(crate) throttle_timer: Option<TimerHandle>,
    pub(crate) pending: Option<(Option<NodeId>, Option<Value>)>,
}

/// Registers (or replaces) an action. Re-registration cancels any running
/// timer and any pending throttle callback of the old record first, so
/// re-arming the same id never leaks a handle or double-fires.
pub fn register_action(engine: &mut Engine, id: &str, directives: Value, throttle: Value) {
    let directives = if directives.is_null() {
        Value::Array(Vec::new())
    } else {
        directives
    };
    if let Some(old) = engine.actions.remove(id) {
        if let Some(handle) = old.timer {
            engine.scheduler.cancel(handle);
        }
        if let Some(handle) = old.throttle_timer {
            engine.scheduler.cancel(handle);
        }
    }
    engine.actions.insert(
        id.to_string(),
        ActionRecord {
            directives,
            throttle,
            timer: None,
            repeating: false,
            throttle_timer: None,
            pending: None,
        },
    );
}

/// Fires an action by id: immediately when unthrottled, otherwise through
/// the single deferred execution of the current throttle window.
pub fn trigger_action(engine: &mut Engine, id: &str, actor: Option<NodeId>, event: Option<Value>) {
    let Some(record) = engine.actions.get(id) else {
        engine.log(
            LogLevel::Warning,
            "action-not-found",
            json!({ "actionId": id }),
        );
        return;
    };
    let throttle_operand = record.throttle.clone();
    let directives = record.directives.clone();
    let throttle = throttle_ms(&engine.resolve(&throttle_operand, actor));
    if throttle > 0 {
        let Some(record) = engine.actions.get_mut(id) else {
            return;
        };
        if record.throttle_timer.is_some() {
            // coalesced into the already scheduled execution
            return;
        }
        record.pending = Some((actor, event));
        let handle = engine.scheduler.schedule(
            throttle,
            None,
            TimerTask::Throttle { id: id.to_string() },
        );
        if let Some(record) = engine.actions.get_mut(id) {
            record.throttle_timer = Some(handle);
        }
    } else {
        engine.exec(&directives, actor, event);
    }
}

/// Arms a one-shot or periodic timer that fires the action's synthetic
/// timer trigger. Any previously armed timer for the id is cancelled first.
pub fn start_timer(engine: &mut Engine, id: &str, interval_ms: u64, repeat: bool) {
    if !engine.actions.contains_key(id) {
        engine.log(
            LogLevel::Error,
            "start:action-not-found",
            json!({ "actionId": id }),
        );
        return;
    }
    stop_timer(engine, id);
    let handle = engine.scheduler.schedule(
        interval_ms,
        repeat.then_some(interval_ms),
        TimerTask::Action { id: id.to_string() },
    );
    if let Some(record) = engine.actions.get_mut(id) {
        record.timer = Some(handle);
        record.repeating = repeat;
    }
}

/// Clears a running timer without removing the registration.
pub fn stop_timer(engine: &mut Engine, id: &str) {
    if let Some(record) = engine.actions.get_mut(id) {
        if let Some(handle) = record.timer.take() {
            engine.scheduler.cancel(handle);
        }
        record.repeating = false;
    }
}

pub(crate) fn timer_fired(engine: &mut Engine, id: &str) {
    if let Some(record) = engine.actions.get_mut(id) {
        if !record.repeating {
            record.timer = None;
        }
    }
    trigger_action(engine, id, None, None);
}

pub(crate) fn throttle_fired(engine: &mut Engine, id: &str) {
    let Some(record) = engine.actions.get_mut(id) else {
        return;
    };
    record.throttle_timer = None;
    let Some((actor, event)) = record.pending.take() else {
        return;
    };
    let directives = record.directives.clone();
    engine.exec(&directives, actor, event);
}

fn throttle_ms(value: &Value) -> u64 {
    match value {
        Value::Number(num) => num.as_u64().unwrap_or(0),
        Value::String(text) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
