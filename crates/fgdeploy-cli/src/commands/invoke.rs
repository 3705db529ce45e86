use super::{
    describe, json_pretty, load, make_deployer, spin_fail, spin_ok, spinner, EngineFlags, Target,
    EXIT_FAILURE, EXIT_SUCCESS,
};
use serde_json::Value;
use std::path::Path;

/// Where the invocation payload comes from.
#[derive(Debug, Clone, Copy)]
pub enum EventSource<'a> {
    File(&'a Path),
    Inline(&'a str),
    /// An empty JSON object.
    Empty,
}

fn read_event(source: EventSource<'_>) -> Result<Value, String> {
    let (text, origin) = match source {
        EventSource::Empty => return Ok(Value::Object(serde_json::Map::new())),
        EventSource::Inline(text) => (text.to_owned(), "--data".to_owned()),
        EventSource::File(path) => (
            std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read event {}: {e}", path.display()))?,
            path.display().to_string(),
        ),
    };
    serde_json::from_str(&text).map_err(|e| format!("event in {origin} is not valid JSON: {e}"))
}

pub fn run(
    target: &Target<'_>,
    function: &str,
    event: EventSource<'_>,
    json: bool,
) -> Result<u8, String> {
    let event = read_event(event)?;
    let (manifest, config) = load(target)?;
    let deployer = make_deployer(config, target.manifest, EngineFlags::default());

    let pb = if json {
        None
    } else {
        Some(spinner(&format!("invoking {function}...")))
    };
    let result = match deployer.invoke(&manifest, function, &event) {
        Ok(result) => result,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "invoke failed");
            }
            return Err(describe(&e));
        }
    };
    let code = if (200..300).contains(&result.status) {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    };

    if json {
        println!("{}", json_pretty(&result)?);
        return Ok(code);
    }
    if let Some(ref pb) = pb {
        if code == EXIT_SUCCESS {
            spin_ok(pb, &format!("{function} invoked"));
        } else {
            spin_fail(pb, &format!("{function} returned status {}", result.status));
        }
    }
    println!("  request id: {}", result.request_id);
    println!("  status:     {}", result.status);
    println!("  result:");
    println!("{}", result.result);
    if !result.log.is_empty() {
        println!("  log:");
        println!("{}", result.log);
    }
    Ok(code)
}
