use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{json, Map};

use wozif_core::config::{KnowledgeConfig, SandboxConfig};
use wozif_core::error::Result;
use wozif_core::types::ExecutionContext;
use wozif_knowledge::{EmbeddingProvider, KnowledgeBase};
use wozif_test_utils::{analysis_reply, context, node, MockSandbox, MockTextGenerator};
use wozif_workflow::NodeExecutor;

/// Embeds every text to the same vector.
struct FlatEmbedder;

impl EmbeddingProvider for FlatEmbedder {
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let vectors = texts.iter().map(|_| vec![1.0, 1.0]).collect();
        Box::pin(async move { Ok(vectors) })
    }

    fn model(&self) -> &str {
        "flat"
    }
}

fn knowledge_base(generator: Arc<MockTextGenerator>, dir: &tempfile::TempDir) -> Arc<KnowledgeBase> {
    let config = KnowledgeConfig {
        knowledge_file: dir.path().join("knowledge.txt").display().to_string(),
        ..KnowledgeConfig::default()
    };
    Arc::new(KnowledgeBase::new(generator, Arc::new(FlatEmbedder), None, config))
}

#[tokio::test]
async fn test_support_workflow_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(
        MockTextGenerator::new()
            .with_json(analysis_reply("question_prix", "neutre", 2))
            .with_text("Le forfait Pro coûte 15 000 FCFA par mois."),
    );
    let kb = knowledge_base(generator.clone(), &dir);
    let executor = NodeExecutor::new(
        generator.clone(),
        kb.clone(),
        Arc::new(MockSandbox::returning(Map::new())),
    );

    let nodes = vec![
        node(1, "gpt_analyze", json!({"aiInstructions": "Le client parle de tarifs"})),
        node(
            2,
            "switch_router",
            json!({"cases": [{"value": "plainte"}, {"value": "question_prix"}]}),
        ),
        node(
            3,
            "rag_knowledge",
            json!({"knowledgeBaseId": "manual", "knowledgeContent": "Forfait Pro: 15 000 FCFA/mois."}),
        ),
        node(4, "send_text", json!({"text": "Bonjour {{name}} ! {{aiAnswer}}"})),
    ];
    let ctx = context(json!({"lastUserMessage": "C'est combien le forfait Pro ?", "name": "Awa"}));

    let out = executor.run(&nodes, ctx).await.unwrap();

    assert_eq!(out.results.len(), 4);
    assert!(out.results.iter().all(|r| r.success));
    assert_eq!(out.results[1].data["matchedIndex"], json!(1));
    assert_eq!(
        out.results[3].data["sent_text"],
        json!("Bonjour Awa ! Le forfait Pro coûte 15 000 FCFA par mois.")
    );
    assert_eq!(out.final_context.get_str("intent"), Some("question_prix"));
    assert_eq!(out.final_context.get("urgency"), Some(&json!(2)));

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Instructions supplémentaires: Le client parle de tarifs"));
    assert!(prompts[1].contains("Forfait Pro: 15 000 FCFA/mois."));
    assert!(prompts[1].contains("C'est combien le forfait Pro ?"));
}

#[tokio::test]
async fn test_static_knowledge_not_ready_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(MockTextGenerator::new());
    let kb = knowledge_base(generator.clone(), &dir);
    assert_eq!(kb.reload().await.unwrap(), 0);

    let executor = NodeExecutor::new(
        generator.clone(),
        kb,
        Arc::new(MockSandbox::returning(Map::new())),
    );
    let out = executor
        .run(&[node(1, "rag_knowledge", json!({}))], ExecutionContext::new())
        .await
        .unwrap();

    assert_eq!(
        out.final_context.get_str("aiAnswer"),
        Some("Désolé, ma base de connaissances n'est pas prête.")
    );
    assert!(generator.prompts().is_empty());
}

#[tokio::test]
async fn test_static_knowledge_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("knowledge.txt"),
        "Wozif Connect automatise WhatsApp.\n\nSupport: support@wozif.com",
    )
    .unwrap();
    let generator = Arc::new(MockTextGenerator::new().with_text("Écrivez à support@wozif.com 📧"));
    let kb = knowledge_base(generator.clone(), &dir);
    assert_eq!(kb.reload().await.unwrap(), 2);

    let executor = NodeExecutor::new(
        generator.clone(),
        kb,
        Arc::new(MockSandbox::returning(Map::new())),
    );
    let out = executor
        .run(
            &[node(1, "rag_knowledge", json!({}))],
            context(json!({"lastUserMessage": "Comment vous contacter ?"})),
        )
        .await
        .unwrap();

    assert_eq!(out.results[0].data["answer"], json!("Écrivez à support@wozif.com 📧"));
    assert!(generator.prompts()[0].contains("Comment vous contacter ?"));
}

#[tokio::test]
async fn test_script_node_in_real_sandbox() {
    let python = std::process::Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !python {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let generator = Arc::new(MockTextGenerator::new());
    let kb = knowledge_base(generator.clone(), &dir);
    let executor = NodeExecutor::new(
        generator,
        kb,
        wozif_workflow::create_sandbox(&SandboxConfig::default()),
    );
    let nodes = vec![
        node(
            1,
            "python_script",
            json!({"script": "context['panier'] = len(context['items'])\nresults['total'] = sum(context['items'])"}),
        ),
        node(2, "python_script", json!({"script": "raise ValueError('stock épuisé')"})),
        node(3, "send_text", json!({"text": "jamais"})),
    ];

    let out = executor
        .run(&nodes, context(json!({"items": [2, 3, 5]})))
        .await
        .unwrap();

    assert_eq!(out.results.len(), 2);
    assert_eq!(out.results[0].data["total"], json!(10));
    assert_eq!(out.final_context.get("panier"), Some(&json!(3)));
    assert_eq!(out.final_context.get("total"), Some(&json!(10)));
    assert_eq!(out.results[1].error.as_deref(), Some("Erreur Python: stock épuisé"));
}
