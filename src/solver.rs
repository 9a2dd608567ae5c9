//! Math solver backed by a schema-constrained language-model call.

use crate::error::SolverError;
use crate::openai::{Message, OpenAiClient};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

const AGENT_NAME: &str = "MathSolver";

const INSTRUCTIONS: &str = r#"You are a math tutor and problem solver. When given a math problem:
1. First, understand the problem clearly
2. Break it down into logical steps
3. Solve each step methodically
4. Provide the final answer in both regular text and LaTeX format
5. Use clear, educational language for each step
6. If the problem involves equations, show the LaTeX representation
7. Always verify your solution makes mathematical sense"#;

/// Structured solution returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MathSolution {
    /// The original math problem from OCR.
    pub problem: String,
    /// Step-by-step solution explanation.
    pub solution: String,
    /// The final answer in LaTeX format.
    pub latex_result: String,
    /// Ordered solution steps, never empty.
    pub steps: Vec<String>,
    /// The final numerical or symbolic answer.
    pub final_answer: String,
}

impl MathSolution {
    /// JSON schema handed to the model. Every field is required.
    pub fn json_schema() -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "problem": {
                    "type": "string",
                    "description": "The original math problem from OCR"
                },
                "solution": {
                    "type": "string",
                    "description": "Step-by-step solution explanation"
                },
                "latexResult": {
                    "type": "string",
                    "description": "The final answer in LaTeX format"
                },
                "steps": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Array of solution steps"
                },
                "finalAnswer": {
                    "type": "string",
                    "description": "The final numerical or symbolic answer"
                }
            },
            "required": ["problem", "solution", "latexResult", "steps", "finalAnswer"],
            "additionalProperties": false
        })
    }

    /// Invariants the schema alone can't express.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.steps.is_empty() {
            return Err(SolverError::InvalidSolution("steps must not be empty".to_string()));
        }
        if self.final_answer.trim().is_empty() {
            return Err(SolverError::InvalidSolution(
                "finalAnswer must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Anything that turns problem text into a [`MathSolution`].
#[async_trait::async_trait]
pub trait MathSolver: Send + Sync {
    async fn solve(&self, problem: &str) -> Result<MathSolution, SolverError>;
}

/// Tutor agent: fixed instructions plus one structured completion per problem.
pub struct MathAgent {
    client: OpenAiClient,
}

impl MathAgent {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

fn build_prompt(problem: &str) -> String {
    format!(
        "Please solve this math problem step by step: {problem}\n\n\
         Provide:\n\
         1. A clear step-by-step solution\n\
         2. The final answer in LaTeX format\n\
         3. Each step explained clearly\n\
         4. The final numerical or symbolic result"
    )
}

#[async_trait::async_trait]
impl MathSolver for MathAgent {
    async fn solve(&self, problem: &str) -> Result<MathSolution, SolverError> {
        let problem = problem.trim();
        if problem.is_empty() {
            return Err(SolverError::EmptyProblem);
        }

        info!("[{}] started solving math problem ({})", AGENT_NAME, self.client.model());

        let messages = vec![Message::system(INSTRUCTIONS), Message::user(build_prompt(problem))];
        let solution: MathSolution = self
            .client
            .chat_json(messages, AGENT_NAME, MathSolution::json_schema())
            .await
            .map_err(SolverError::Request)?;

        solution.validate()?;

        info!(
            "[{}] produced solution: {} steps, final answer {}",
            AGENT_NAME,
            solution.steps.len(),
            solution.final_answer
        );
        debug!("Solution: {:?}", solution);

        Ok(solution)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{OpenAiConfig, Secret};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn two_plus_two() -> MathSolution {
        MathSolution {
            problem: "2 + 2 = ?".to_string(),
            solution: "Add the two numbers.".to_string(),
            latex_result: "2 + 2 = 4".to_string(),
            steps: vec!["Add 2 and 2 to get 4.".to_string()],
            final_answer: "4".to_string(),
        }
    }

    fn agent_for(server: &MockServer) -> MathAgent {
        let config = OpenAiConfig {
            api_key: Secret::new("sk-test"),
            model: "gpt-4o".to_string(),
            base_url: server.uri(),
        };
        MathAgent::new(OpenAiClient::new(&config, reqwest::Client::new()))
    }

    fn completion_with(content: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content.to_string()}}]
        }))
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(two_plus_two()).unwrap();
        assert_eq!(json["latexResult"], "2 + 2 = 4");
        assert_eq!(json["finalAnswer"], "4");
        assert!(json.get("final_answer").is_none());
    }

    #[test]
    fn test_schema_requires_every_field() {
        let schema = MathSolution::json_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        let properties = schema["properties"].as_object().unwrap();

        assert_eq!(required.len(), properties.len());
        for key in properties.keys() {
            assert!(required.contains(&key.as_str()), "{key} not required");
        }
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_validate() {
        assert!(two_plus_two().validate().is_ok());

        let mut no_steps = two_plus_two();
        no_steps.steps.clear();
        assert!(matches!(no_steps.validate(), Err(SolverError::InvalidSolution(_))));

        let mut blank_answer = two_plus_two();
        blank_answer.final_answer = "  ".to_string();
        assert!(blank_answer.validate().is_err());
    }

    #[test]
    fn test_prompt_embeds_problem() {
        let prompt = build_prompt("x + 1 = 3");
        assert!(prompt.starts_with("Please solve this math problem step by step: x + 1 = 3"));
        assert!(prompt.contains("LaTeX"));
    }

    #[tokio::test]
    async fn test_solve_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_string_contains("2 + 2 = ?"))
            .respond_with(completion_with(serde_json::to_value(two_plus_two()).unwrap()))
            .expect(1)
            .mount(&server)
            .await;

        let solution = agent_for(&server).solve("2 + 2 = ?").await.unwrap();
        assert_eq!(solution.final_answer, "4");
        assert!(!solution.steps.is_empty());
    }

    #[tokio::test]
    async fn test_missing_field_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion_with(json!({"problem": "2 + 2", "finalAnswer": "4"})))
            .mount(&server)
            .await;

        let err = agent_for(&server).solve("2 + 2").await.unwrap_err();
        assert!(matches!(err, SolverError::Request(_)));
    }

    #[tokio::test]
    async fn test_empty_steps_rejected() {
        let mut solution = two_plus_two();
        solution.steps.clear();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion_with(serde_json::to_value(solution).unwrap()))
            .mount(&server)
            .await;

        let err = agent_for(&server).solve("2 + 2").await.unwrap_err();
        assert!(matches!(err, SolverError::InvalidSolution(_)));
    }

    #[tokio::test]
    async fn test_empty_problem_skips_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let err = agent_for(&server).solve("   ").await.unwrap_err();
        assert!(matches!(err, SolverError::EmptyProblem));
    }
}
