use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsValue;

use crate::{interpret, Error};

impl From<Error> for JsValue {
    fn from(err: Error) -> JsValue {
        JsValue::from(format!("wsi error occurred: {}", err))
    }
}

/// Runs a whitespace program in the browser, feeding it `input` and returning everything it
/// printed.
///
/// - `source` the whitespace source as a String
/// - `input` text consumed by `readchar` and `readnum`
#[wasm_bindgen(js_name = interpretSource)]
pub fn interpret_source(source: &str, input: &str) -> Result<String, JsValue> {
    Ok(run_to_string(source, input)?)
}

fn run_to_string(source: &str, input: &str) -> Result<String, Error> {
    let mut output = vec![];
    interpret(source.as_bytes(), &mut input.as_bytes(), &mut output)?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}
