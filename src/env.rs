use std::{cell::RefCell, ffi::OsStr};

use crate::features::Features;

/// Variable listing datapath features, used when `--features` is not given.
pub const FEATURES_VAR: &str = "WMACH_FEATURES";

#[derive(Clone, Copy)]
struct Env {
    features: Option<Features>,
    minimal: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read the environment once. Fails if `WMACH_FEATURES` does not parse.
pub fn init() -> Result<(), String> {
    let features = match var(FEATURES_VAR) {
        Some(list) => Some(
            list.parse::<Features>()
                .map_err(|err| format!("{} in {}", err, FEATURES_VAR))?,
        ),
        None => None,
    };
    let value = Env {
        features,
        minimal: var_is("WMACH_MINIMAL", "1"),
    };
    set_env(value);
    Ok(())
}

pub fn features() -> Option<Features> {
    with_env(|env| env.features)
}

pub fn is_minimal() -> bool {
    with_env(|env| env.minimal)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        let env = env.unwrap_or_else(|| {
            panic!("tried to access environment state before initialization");
        });
        callback(&env)
    })
}

fn var(name: impl AsRef<OsStr>) -> Option<String> {
    std::env::var(name.as_ref()).ok().filter(|v| !v.is_empty())
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}
