use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use wozif_core::error::Result;
use wozif_core::traits::{KnowledgeRetriever, ScriptSandbox, TextGenerator};
use wozif_core::types::{ExecutionContext, NodeResult, RunOutput, WorkflowNode};

use crate::handlers;
use crate::spec::{NodeKind, NodeSpec};

/// Executes workflow runs against the shared collaborators.
///
/// The executor holds no per-run state: each `run` owns its context, so
/// one executor can serve any number of concurrent runs.
#[derive(Clone)]
pub struct NodeExecutor {
    generator: Arc<dyn TextGenerator>,
    knowledge: Arc<dyn KnowledgeRetriever>,
    sandbox: Arc<dyn ScriptSandbox>,
}

impl NodeExecutor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        knowledge: Arc<dyn KnowledgeRetriever>,
        sandbox: Arc<dyn ScriptSandbox>,
    ) -> Self {
        Self {
            generator,
            knowledge,
            sandbox,
        }
    }

    /// Execute `nodes` in order against `context`.
    ///
    /// Every node config is validated before the first node runs. The run
    /// stops after the first node whose result reports failure; that
    /// result is the last one returned. Context changes made by earlier
    /// nodes are kept.
    ///
    /// Returns `Err` when a config is malformed or a knowledge node's
    /// service call fails.
    pub async fn run(&self, nodes: &[WorkflowNode], context: ExecutionContext) -> Result<RunOutput> {
        let start = Instant::now();
        let specs = nodes
            .iter()
            .map(NodeSpec::from_node)
            .collect::<Result<Vec<_>>>()?;

        let mut context = context;
        let mut results = Vec::with_capacity(specs.len());

        for spec in &specs {
            info!(
                node_id = %spec.id,
                node_name = %spec.name,
                node_type = spec.kind.tag(),
                "Executing node"
            );
            let node_start = Instant::now();
            let result = self.execute_node(spec, &mut context).await?;
            let succeeded = result.success;

            debug!(
                node_id = %spec.id,
                succeeded,
                elapsed_ms = node_start.elapsed().as_millis() as u64,
                "Node execution complete"
            );
            results.push(result);

            if !succeeded {
                warn!(node_id = %spec.id, "Node failed, stopping run");
                break;
            }
        }

        info!(
            nodes = specs.len(),
            executed = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Workflow run complete"
        );
        Ok(RunOutput {
            results,
            final_context: context,
        })
    }

    /// Dispatch one validated node to its handler.
    pub async fn execute_node(&self, spec: &NodeSpec, context: &mut ExecutionContext) -> Result<NodeResult> {
        let id = spec.id.clone();
        let result = match &spec.kind {
            NodeKind::SendText(cfg) => handlers::send_text(id, cfg, context),
            NodeKind::AiAgent(cfg) => {
                handlers::ai_agent(id, cfg, self.knowledge.as_ref(), context).await?
            }
            NodeKind::SwitchRouter(cfg) => handlers::switch_router(id, cfg, context),
            NodeKind::GptAnalyze(cfg) => {
                handlers::gpt_analyze(id, cfg, self.generator.as_ref(), context).await
            }
            NodeKind::Sentiment(cfg) => {
                handlers::sentiment(id, cfg, self.generator.as_ref(), context).await
            }
            NodeKind::RagKnowledge(cfg) => {
                handlers::rag_knowledge(id, cfg, self.knowledge.as_ref(), context).await?
            }
            NodeKind::PythonScript(cfg) => {
                handlers::python_script(id, cfg, self.sandbox.as_ref(), context).await
            }
            NodeKind::LongTermMemory(cfg) => handlers::long_term_memory(id, cfg, context),
            NodeKind::CheckAvailability(cfg) => handlers::check_availability(id, cfg, context),
            NodeKind::BookAppointment(cfg) => handlers::book_appointment(id, cfg, context),
            NodeKind::CancelAppointment(cfg) => handlers::cancel_appointment(id, cfg),
            NodeKind::Unknown { tag } => handlers::unknown(id, tag),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use wozif_core::types::NodeId;
    use wozif_test_utils::{
        analysis_reply, bare_node, context, node, KnowledgeCall, MockKnowledge, MockSandbox,
        MockTextGenerator,
    };

    fn executor(generator: MockTextGenerator, knowledge: MockKnowledge) -> NodeExecutor {
        NodeExecutor::new(
            Arc::new(generator),
            Arc::new(knowledge),
            Arc::new(MockSandbox::returning(Map::new())),
        )
    }

    fn quiet() -> NodeExecutor {
        executor(MockTextGenerator::new(), MockKnowledge::answering("ok"))
    }

    #[tokio::test]
    async fn test_runs_all_nodes_in_order() {
        let nodes = vec![
            node(1, "send_text", json!({"text": "Bonjour {{name}}"})),
            node(2, "check_availability", json!({})),
            bare_node(3, "cancel_appointment"),
        ];
        let out = quiet()
            .run(&nodes, context(json!({"name": "Awa"})))
            .await
            .unwrap();

        assert_eq!(out.results.len(), 3);
        assert!(out.results.iter().all(|r| r.success));
        let ids: Vec<_> = out.results.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![NodeId::Int(1), NodeId::Int(2), NodeId::Int(3)]);
        assert!(out.final_context.get("formatted_slots").is_some());
    }

    #[tokio::test]
    async fn test_empty_workflow() {
        let ctx = context(json!({"lastUserMessage": "salut"}));
        let out = quiet().run(&[], ctx.clone()).await.unwrap();
        assert!(out.results.is_empty());
        assert_eq!(out.final_context, ctx);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let generator = MockTextGenerator::new().with_failure("model overloaded");
        let nodes = vec![
            node("a", "python_script", json!({"script": "context['seen'] = 1"})),
            node("b", "sentiment", json!({})),
            node("c", "send_text", json!({"text": "never"})),
        ];
        let sandbox = MockSandbox::new(|_, ctx| {
            let mut context = ctx.clone();
            context.insert("seen".into(), json!(1));
            Ok(wozif_core::traits::ScriptOutcome {
                context,
                ..Default::default()
            })
        });
        let exec = NodeExecutor::new(
            Arc::new(generator),
            Arc::new(MockKnowledge::answering("ok")),
            Arc::new(sandbox),
        );

        let out = exec.run(&nodes, ExecutionContext::new()).await.unwrap();

        assert_eq!(out.results.len(), 2);
        assert!(out.results[0].success);
        assert!(!out.results[1].success);
        assert_eq!(out.results[1].id, NodeId::from("b"));
        assert_eq!(out.final_context.get("seen"), Some(&json!(1)));
        assert!(out.final_context.get("sentiment").is_none());
    }

    #[tokio::test]
    async fn test_partial_sentiment_writes_survive_the_stop() {
        let exec = executor(
            MockTextGenerator::new()
                .with_json(json!({"sentiment": "négatif", "sentiment_score": "bas", "tone": "hostile"})),
            MockKnowledge::answering("ok"),
        );
        let nodes = vec![
            node(1, "sentiment", json!({})),
            node(2, "send_text", json!({"text": "never"})),
        ];

        let out = exec.run(&nodes, ExecutionContext::new()).await.unwrap();

        assert_eq!(out.results.len(), 1);
        assert!(!out.results[0].success);
        assert_eq!(out.final_context.get_str("sentiment"), Some("négatif"));
        assert_eq!(out.final_context.get_str("tone"), Some("hostile"));
        assert!(out.final_context.get("is_negative_sentiment").is_none());
    }

    #[tokio::test]
    async fn test_failing_first_node_keeps_only_its_mutations() {
        let sandbox = MockSandbox::new(|_, ctx| {
            let mut context = ctx.clone();
            context.insert("partial".into(), json!(true));
            Ok(wozif_core::traits::ScriptOutcome {
                context,
                results: Map::new(),
                error: Some("division by zero".into()),
            })
        });
        let exec = NodeExecutor::new(
            Arc::new(MockTextGenerator::new()),
            Arc::new(MockKnowledge::answering("ok")),
            Arc::new(sandbox),
        );
        let nodes = vec![
            node(1, "python_script", json!({"script": "context['partial'] = True\n1/0"})),
            node(2, "check_availability", json!({})),
        ];

        let out = exec.run(&nodes, ExecutionContext::new()).await.unwrap();

        assert_eq!(out.results.len(), 1);
        assert_eq!(out.final_context.get("partial"), Some(&json!(true)));
        assert!(out.final_context.get("available_slots").is_none());
    }

    #[tokio::test]
    async fn test_analyze_then_route() {
        let generator = MockTextGenerator::new().with_json(analysis_reply("plainte", "négatif", 5));
        let exec = executor(generator, MockKnowledge::answering("ok"));
        let nodes = vec![
            node(1, "gpt_analyze", json!({})),
            node(
                2,
                "switch_router",
                json!({"field": "intent", "cases": [{"value": "commande"}, {"value": "Plainte"}]}),
            ),
        ];

        let out = exec
            .run(&nodes, context(json!({"lastUserMessage": "Colis abîmé !"})))
            .await
            .unwrap();

        assert_eq!(out.results[1].data["matchedIndex"], json!(1));
        assert_eq!(out.final_context.get_str("type"), Some("plainte"));
    }

    #[tokio::test]
    async fn test_knowledge_then_send_answer() {
        let knowledge = MockKnowledge::answering("Nous livrons en 48h.");
        let exec = executor(MockTextGenerator::new(), knowledge);
        let nodes = vec![
            node(1, "rag_knowledge", json!({"knowledgeBaseId": "faq"})),
            node(2, "send_text", json!({"text": "{{aiAnswer}}"})),
        ];

        let out = exec
            .run(&nodes, context(json!({"lastUserMessage": "Délais ?"})))
            .await
            .unwrap();

        assert_eq!(out.results[1].data["sent_text"], json!("Nous livrons en 48h."));
    }

    #[tokio::test]
    async fn test_knowledge_error_aborts_run() {
        let exec = executor(MockTextGenerator::new(), MockKnowledge::failing("embedding down"));
        let nodes = vec![
            node(1, "send_text", json!({"text": "un instant"})),
            node(2, "ai_agent", json!({})),
        ];
        let err = exec.run(&nodes, ExecutionContext::new()).await.unwrap_err();
        assert!(err.to_string().contains("embedding down"));
    }

    #[tokio::test]
    async fn test_malformed_config_aborts_before_execution() {
        let knowledge = Arc::new(MockKnowledge::answering("ok"));
        let exec = NodeExecutor::new(
            Arc::new(MockTextGenerator::new()),
            knowledge.clone(),
            Arc::new(MockSandbox::returning(Map::new())),
        );
        let nodes = vec![
            node(1, "rag_knowledge", json!({})),
            WorkflowNode::new(2, "send_text", "{\"text\": "),
        ];

        let err = exec.run(&nodes, ExecutionContext::new()).await.unwrap_err();

        assert!(err.is_config_error());
        assert!(err.to_string().contains("node 2"));
        assert!(knowledge.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_node_is_noop() {
        let ctx = context(json!({"a": 1}));
        let nodes = vec![node("x", "send_email", json!({"to": "a@b.c"}))];
        let out = quiet().run(&nodes, ctx.clone()).await.unwrap();
        assert!(out.results[0].success);
        assert_eq!(out.final_context, ctx);
    }

    #[tokio::test]
    async fn test_deterministic_output() {
        let nodes = vec![
            node(1, "sentiment", json!({})),
            node(2, "send_text", json!({"text": "Score {{tone}}"})),
            node(3, "book_appointment", json!({"title": "Démo"})),
        ];
        let ctx = context(json!({"lastUserMessage": "Merci beaucoup", "userId": "u1"}));
        let reply = json!({"sentiment": "positif", "sentiment_score": 0.8, "tone": "amical"});

        let mut outputs = Vec::new();
        for _ in 0..2 {
            let exec = executor(
                MockTextGenerator::new().with_json(reply.clone()),
                MockKnowledge::answering("ok"),
            );
            let out = exec.run(&nodes, ctx.clone()).await.unwrap();
            outputs.push(serde_json::to_string(&out).unwrap());
        }
        assert_eq!(outputs[0], outputs[1]);
    }

    #[tokio::test]
    async fn test_agent_receives_tool_endpoints() {
        let knowledge = Arc::new(MockKnowledge::answering("fait"));
        let exec = NodeExecutor::new(
            Arc::new(MockTextGenerator::new()),
            knowledge.clone(),
            Arc::new(MockSandbox::returning(Map::new())),
        );
        let nodes = vec![node(
            1,
            "ai_agent",
            json!({"dataSources": {"mcpProviders": ["http://tools.local"]}}),
        )];

        exec.run(&nodes, ExecutionContext::new()).await.unwrap();

        let KnowledgeCall::Sources { request, .. } = &knowledge.calls()[0] else {
            panic!("expected a sources call");
        };
        assert_eq!(request.tool_endpoints, vec!["http://tools.local"]);
        assert_eq!(request.instructions, "Tu es un assistant utile.");
    }
}
