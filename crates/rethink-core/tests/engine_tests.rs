use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use rethink_core::{Engine, EngineConfig, EnginePrompts, RunOutcome};
use rethink_logging::{LogFormat, Logger};
use rethink_provider::{CompletionSource, Message, ProviderError, Role, TextStream};

/// Generator stub: plays one scripted delta sequence per iteration and
/// records the temperature of every streaming call.
struct ScriptedGenerator {
    scripts: Mutex<VecDeque<Vec<&'static str>>>,
    delta_delay: Duration,
    temperatures: Mutex<Vec<f32>>,
}

impl ScriptedGenerator {
    fn new(scripts: Vec<Vec<&'static str>>, delta_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            delta_delay,
            temperatures: Mutex::new(Vec::new()),
        })
    }

    fn temperatures(&self) -> Vec<f32> {
        self.temperatures.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionSource for ScriptedGenerator {
    async fn stream_chat(
        &self,
        _messages: &[Message],
        temperature: f32,
    ) -> Result<TextStream, ProviderError> {
        self.temperatures.lock().unwrap().push(temperature);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("generator called more times than scripted");
        let delay = self.delta_delay;

        Ok(Box::pin(async_stream::stream! {
            for delta in script {
                sleep(delay).await;
                yield Ok(delta.to_string());
            }
        }))
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        unreachable!("the generator is never used single-shot")
    }
}

/// Auditor stub: replies per unit body, with injectable latency to force
/// out-of-order verdict arrival. Unknown units pass.
struct ScriptedAuditor {
    replies: HashMap<&'static str, (Duration, &'static str)>,
}

impl ScriptedAuditor {
    fn new(replies: Vec<(&'static str, Duration, &'static str)>) -> Arc<Self> {
        Arc::new(Self {
            replies: replies
                .into_iter()
                .map(|(body, latency, reply)| (body, (latency, reply)))
                .collect(),
        })
    }
}

#[async_trait]
impl CompletionSource for ScriptedAuditor {
    async fn stream_chat(
        &self,
        _messages: &[Message],
        _temperature: f32,
    ) -> Result<TextStream, ProviderError> {
        unreachable!("the auditor is never streamed")
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _temperature: f32,
    ) -> Result<String, ProviderError> {
        let body = extract_unit_body(user_prompt);
        match self.replies.get(body.as_str()) {
            Some((latency, reply)) => {
                sleep(*latency).await;
                Ok(reply.to_string())
            }
            None => Ok("<status>OK</status>".to_string()),
        }
    }
}

fn extract_unit_body(prompt: &str) -> String {
    let start = prompt.find("<idea>").expect("audit prompt carries a unit") + "<idea>".len();
    let end = start + prompt[start..].find("</idea>").expect("unit body is closed");
    prompt[start..end].to_string()
}

fn engine(
    generator: Arc<ScriptedGenerator>,
    auditor: Arc<ScriptedAuditor>,
    config: EngineConfig,
) -> Engine {
    Engine::new(
        generator,
        auditor,
        config,
        Arc::new(Logger::new(LogFormat::Json)),
    )
}

fn interventions(transcript: &[Message]) -> Vec<&Message> {
    transcript
        .iter()
        .filter(|m| m.role == Role::User && m.content.starts_with("[SYSTEM INTERVENTION"))
        .collect()
}

const MS: Duration = Duration::from_millis(1);

#[tokio::test]
async fn test_clean_run_returns_final_answer() {
    let generator = ScriptedGenerator::new(
        vec![vec![
            "<idea>A</idea>",
            "<idea>B</idea>",
            "<final_answer>X</final_answer>",
        ]],
        10 * MS,
    );
    // B's verdict is still pending when the terminal marker appears; the
    // guardrail must wait for it before letting the answer stand.
    let auditor = ScriptedAuditor::new(vec![
        ("A", 5 * MS, "<status>OK</status>"),
        ("B", 80 * MS, "<status>OK</status>"),
    ]);

    let mut engine = engine(generator, auditor, EngineConfig::default());
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            answer: "X".to_string(),
            takeovers: 0,
        }
    );

    let transcript = engine.transcript().await;
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[0].role, Role::System);
    assert_eq!(transcript[1].content, "solve it");
    assert_eq!(transcript[2].role, Role::Assistant);
    assert_eq!(
        transcript[2].content,
        "<idea>A</idea><idea>B</idea><final_answer>X</final_answer>"
    );
}

#[tokio::test]
async fn test_rejection_mid_stream_truncates_and_restarts() {
    let generator = ScriptedGenerator::new(
        vec![
            {
                let mut script = vec!["Let me think. ", "<idea>A</idea>"];
                script.extend(std::iter::repeat(".").take(40));
                script
            },
            vec!["<idea>A2</idea><final_answer>done</final_answer>"],
        ],
        10 * MS,
    );
    let auditor = ScriptedAuditor::new(vec![(
        "A",
        50 * MS,
        "<status>FAIL</status><fix>use A2</fix>",
    )]);

    let mut engine = engine(generator, auditor, EngineConfig::default());
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            answer: "done".to_string(),
            takeovers: 1,
        }
    );

    let transcript = engine.transcript().await;
    // Committed text stops at the failing unit's start offset
    assert_eq!(transcript[2].role, Role::Assistant);
    assert_eq!(transcript[2].content, "Let me think. ");

    let interventions = interventions(&transcript);
    assert_eq!(interventions.len(), 1);
    assert!(interventions[0].content.contains("use A2"));
    assert!(interventions[0].content.contains("solve it"));
}

#[tokio::test]
async fn test_guardrail_discards_terminal_text_on_late_rejection() {
    let generator = ScriptedGenerator::new(
        vec![
            vec!["Thinking. ", "<idea>S</idea>", "<final_answer>bad</final_answer>"],
            vec!["<idea>ok</idea><final_answer>good</final_answer>"],
        ],
        10 * MS,
    );
    // The rejection lands only after the terminal marker has appeared
    let auditor = ScriptedAuditor::new(vec![(
        "S",
        100 * MS,
        "<status>FAIL</status><fix>fix S</fix>",
    )]);

    let mut engine = engine(generator, auditor, EngineConfig::default());
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            answer: "good".to_string(),
            takeovers: 1,
        }
    );

    let transcript = engine.transcript().await;
    // The discarded terminal text never reaches history: the commit stops
    // at the failing unit's offset.
    assert_eq!(transcript[2].content, "Thinking. ");
    for message in &transcript {
        assert!(!message.content.contains("bad"));
    }
    assert!(interventions(&transcript)[0].content.contains("fix S"));
}

#[tokio::test]
async fn test_racing_rejections_execute_exactly_one_takeover() {
    let generator = ScriptedGenerator::new(
        vec![
            {
                let mut script = vec!["x", "<idea>X1</idea><idea>X2</idea><idea>X3</idea>"];
                script.extend(std::iter::repeat(".").take(40));
                script
            },
            vec!["<final_answer>recovered</final_answer>"],
        ],
        10 * MS,
    );
    // All three reject with identical latency to force the race
    let auditor = ScriptedAuditor::new(vec![
        ("X1", 30 * MS, "<status>FAIL</status><fix>fix one</fix>"),
        ("X2", 30 * MS, "<status>FAIL</status><fix>fix two</fix>"),
        ("X3", 30 * MS, "<status>FAIL</status><fix>fix three</fix>"),
    ]);

    let mut engine = engine(generator, auditor, EngineConfig::default());
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(outcome.takeovers(), 1);

    let transcript = engine.transcript().await;
    assert_eq!(interventions(&transcript).len(), 1);
    // One takeover means one truncated commit for the first iteration:
    // preamble, commit, intervention, then the clean second iteration.
    assert_eq!(transcript.len(), 5);
}

#[tokio::test]
async fn test_guardrail_picks_smallest_index_not_fastest_arrival() {
    let generator = ScriptedGenerator::new(
        vec![
            vec!["ab<idea>I0</idea><idea>I1</idea><final_answer>nope</final_answer>"],
            vec!["<final_answer>clean</final_answer>"],
        ],
        5 * MS,
    );
    // The later unit's rejection arrives first; the earlier unit must win.
    let auditor = ScriptedAuditor::new(vec![
        ("I0", 80 * MS, "<status>FAIL</status><fix>fix zero</fix>"),
        ("I1", 20 * MS, "<status>FAIL</status><fix>fix one</fix>"),
    ]);

    let mut engine = engine(generator, auditor, EngineConfig::default());
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(outcome.takeovers(), 1);

    let transcript = engine.transcript().await;
    // Truncated at I0's start offset, which is 2 ("ab")
    assert_eq!(transcript[2].content, "ab");
    let interventions = interventions(&transcript);
    assert_eq!(interventions.len(), 1);
    assert!(interventions[0].content.contains("fix zero"));
    assert!(!interventions[0].content.contains("fix one"));
}

#[tokio::test]
async fn test_budget_exhaustion_returns_tagged_abort() {
    let generator = ScriptedGenerator::new(
        vec![vec!["p<idea>bad</idea>"], vec!["p<idea>bad</idea>"]],
        5 * MS,
    );
    let auditor = ScriptedAuditor::new(vec![(
        "bad",
        10 * MS,
        "<status>FAIL</status><fix>no way out</fix>",
    )]);

    let config = EngineConfig::default().with_max_takeovers(2);
    let mut engine = engine(generator, auditor, config);
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::RetriesExhausted {
            takeovers: 2,
            max_takeovers: 2,
        }
    );
    assert_eq!(outcome.answer(), None);
}

#[tokio::test]
async fn test_temperature_ramps_with_consecutive_restarts() {
    let generator = ScriptedGenerator::new(
        vec![
            vec!["q<idea>b1</idea>"],
            vec!["q<idea>b2</idea>"],
            vec!["<idea>fine</idea><final_answer>fin</final_answer>"],
        ],
        5 * MS,
    );
    let auditor = ScriptedAuditor::new(vec![
        ("b1", 10 * MS, "<status>FAIL</status><fix>f1</fix>"),
        ("b2", 10 * MS, "<status>FAIL</status><fix>f2</fix>"),
    ]);

    let config = EngineConfig::default().with_max_takeovers(10);
    let generator_handle = generator.clone();
    let mut engine = engine(generator, auditor, config);
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(outcome.takeovers(), 2);

    // One restart keeps the base temperature; the second starts ramping.
    let temperatures = generator_handle.temperatures();
    assert_eq!(temperatures.len(), 3);
    assert_eq!(temperatures[0], 0.0);
    assert_eq!(temperatures[1], 0.0);
    assert!((temperatures[2] - 0.1).abs() < 1e-6);
}

#[tokio::test]
async fn test_history_preamble_survives_takeovers() {
    let generator = ScriptedGenerator::new(
        vec![
            vec!["r<idea>w1</idea>"],
            vec!["r<idea>w2</idea>"],
            vec!["<final_answer>end</final_answer>"],
        ],
        5 * MS,
    );
    let auditor = ScriptedAuditor::new(vec![
        ("w1", 10 * MS, "<status>FAIL</status><fix>g1</fix>"),
        ("w2", 10 * MS, "<status>FAIL</status><fix>g2</fix>"),
    ]);

    let config = EngineConfig::default().with_max_takeovers(10);
    let mut engine = engine(generator, auditor, config);
    engine.run("the original task").await.unwrap();

    let transcript = engine.transcript().await;
    assert_eq!(transcript[0].role, Role::System);
    assert_eq!(
        transcript[0].content,
        EnginePrompts::generator_system_prompt()
    );
    assert_eq!(transcript[1].role, Role::User);
    assert_eq!(transcript[1].content, "the original task");
}

#[tokio::test]
async fn test_unparseable_audit_fails_open() {
    let generator = ScriptedGenerator::new(
        vec![vec!["<idea>odd</idea><final_answer>kept</final_answer>"]],
        5 * MS,
    );
    let auditor = ScriptedAuditor::new(vec![("odd", 10 * MS, "no status marker here")]);

    let mut engine = engine(generator, auditor, EngineConfig::default());
    let outcome = engine.run("solve it").await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            answer: "kept".to_string(),
            takeovers: 0,
        }
    );
}
