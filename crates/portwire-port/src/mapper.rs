use std::sync::Weak;

use portwire_frame::{Decoded, Envelope};
use serde_json::Value;

use crate::callbacks::CallbackMap;
use crate::dispatch::Dispatcher;
use crate::error::{PortError, RemoteError, Result};
use crate::value::{Arg, Callback};

/// Turn an outbound [`Arg`] into its wire value.
///
/// Callbacks are interned into `callbacks` and travel as their id. Errors
/// travel as error envelopes. Plain values pass through untouched unless
/// they collide with the reserved tag key, in which case they get wrapped.
pub(crate) fn map_arg(callbacks: &mut CallbackMap, arg: Arg) -> Value {
    match arg {
        Arg::Callback(callback) => {
            let id = callbacks.intern(&callback);
            Envelope::Callback { id }.encode()
        }
        Arg::Error(error) => Envelope::Error(error.to_info()).encode(),
        Arg::Value(value) if Envelope::is_tagged(&value) => Envelope::Raw(value).encode(),
        Arg::Value(value) => value,
    }
}

pub(crate) fn map_args(callbacks: &mut CallbackMap, args: Vec<Arg>) -> Vec<Value> {
    args.into_iter()
        .map(|arg| map_arg(callbacks, arg))
        .collect()
}

/// Turn an inbound wire value back into an [`Arg`].
///
/// Callback envelopes become remote proxies bound to `origin`, the port the
/// value arrived on, so invoking them routes a nested frame back to the
/// peer that owns the function. A tagged value we cannot decode fails the
/// whole unmapping.
pub(crate) fn unmap_value(origin: &Weak<Dispatcher>, value: Value) -> Result<Arg> {
    match Envelope::decode(value) {
        Ok(Decoded::Plain(value)) => Ok(Arg::Value(value)),
        Ok(Decoded::Envelope(Envelope::Callback { id })) => {
            Ok(Arg::Callback(Callback::remote(id, Weak::clone(origin))))
        }
        Ok(Decoded::Envelope(Envelope::Error(info))) => {
            Ok(Arg::Error(RemoteError::from_info(info)))
        }
        Ok(Decoded::Envelope(Envelope::Raw(inner))) => Ok(Arg::Value(inner)),
        Err(error) => Err(PortError::CannotUnmap(error.to_string())),
    }
}

pub(crate) fn unmap_args(origin: &Weak<Dispatcher>, values: Vec<Value>) -> Result<Vec<Arg>> {
    values
        .into_iter()
        .map(|value| unmap_value(origin, value))
        .collect()
}
