//! Effect steps: fixed side-effecting actions with no reasoning loop.
//!
//! Each action maps to exactly one tool call. There is no retry and no rule
//! evaluation; any failure fails the step.

use leadline_agent::{StepExecutionError, ToolContext, ToolError, ToolRegistry, payload_to_text};
use serde_json::{Map, Value};

use crate::context::ContextResolver;
use crate::definition::EffectAction;
use crate::error::StepError;
use crate::run::StepOutput;

/// Execute `action` against the preceding step's output.
pub async fn execute(
    action: &EffectAction,
    prior: Option<&StepOutput>,
    resolver: &ContextResolver<'_>,
    tools: &ToolRegistry,
    ctx: &ToolContext,
) -> Result<StepOutput, StepError> {
    let tool = action.tool_name();

    match action {
        EffectAction::Synthesize { voice } => {
            let text = match prior {
                Some(StepOutput::Text { text }) => text,
                other => return Err(unexpected("text", other).into()),
            };
            let mut input = Map::new();
            input.insert("text".into(), Value::String(text.clone()));
            if let Some(voice) = voice {
                input.insert("voice".into(), Value::String(voice.clone()));
            }

            let payload = tools.invoke(tool, Value::Object(input), ctx).await?;
            Ok(artifact_from_payload(tool, &payload)?)
        }
        EffectAction::Play => {
            let (id, location) = match prior {
                Some(StepOutput::Artifact { id, location, .. }) => (id, location),
                other => return Err(unexpected("artifact", other).into()),
            };
            let input = serde_json::json!({
                "path": location,
                "artifact_id": id,
            });
            tools.invoke(tool, input, ctx).await?;
            Ok(StepOutput::Void)
        }
        EffectAction::Deliver { payload } => {
            let rendered = resolver.render_value(payload)?;
            let ack = tools.invoke(tool, rendered, ctx).await?;
            Ok(StepOutput::Delivered {
                ack: payload_to_text(&ack),
            })
        }
    }
}

fn unexpected(expected: &'static str, found: Option<&StepOutput>) -> StepExecutionError {
    StepExecutionError::UnexpectedInput {
        expected,
        found: found.map_or("nothing", StepOutput::kind).to_string(),
    }
}

fn artifact_from_payload(tool: &str, payload: &Value) -> Result<StepOutput, StepExecutionError> {
    let field = |name: &str| -> Result<String, StepExecutionError> {
        payload
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                StepExecutionError::tool(
                    tool,
                    ToolError::malformed(format!("artifact reference is missing '{}'", name)),
                )
            })
    };

    Ok(StepOutput::Artifact {
        id: field("artifact_id")?,
        location: field("path")?,
        media_type: payload
            .get("media_type")
            .and_then(Value::as_str)
            .unwrap_or("application/octet-stream")
            .to_string(),
    })
}
