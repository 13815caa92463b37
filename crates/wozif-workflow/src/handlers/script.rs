use tracing::warn;

use wozif_core::traits::ScriptSandbox;
use wozif_core::types::{ExecutionContext, NodeId, NodeResult};

use crate::spec::PythonScriptConfig;

/// Run the node's script in the sandbox. The script sees `context` and an
/// empty `results` dict; afterwards the context is replaced by the
/// script's copy and `results` merged on top. Context changes made before
/// a script error are kept.
pub async fn python_script(
    id: NodeId,
    config: &PythonScriptConfig,
    sandbox: &dyn ScriptSandbox,
    context: &mut ExecutionContext,
) -> NodeResult {
    if config.script.is_empty() {
        return NodeResult::success(id, "Script vide");
    }

    let outcome = match sandbox.run(&config.script, context.data()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(node_id = %id, error = %e, "Script sandbox failed");
            return NodeResult::failure(id, format!("Erreur Python: {}", e));
        }
    };

    context.replace(outcome.context);
    if let Some(error) = outcome.error {
        warn!(node_id = %id, %error, "Script raised");
        return NodeResult::failure(id, format!("Erreur Python: {}", error));
    }

    context.merge(&outcome.results);
    NodeResult::success(id, "Script Python exécuté avec succès").with_data(outcome.results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use wozif_core::error::WozifError;
    use wozif_core::traits::ScriptOutcome;
    use wozif_test_utils::{context, MockSandbox};

    fn script(code: &str) -> PythonScriptConfig {
        PythonScriptConfig {
            script: code.into(),
        }
    }

    #[tokio::test]
    async fn test_empty_script_skips_sandbox() {
        let sandbox = MockSandbox::returning(Map::new());
        let mut ctx = context(json!({"a": 1}));
        let r = python_script(NodeId::Int(7), &script(""), &sandbox, &mut ctx).await;
        assert!(r.success);
        assert_eq!(r.message, "Script vide");
        assert!(sandbox.scripts().is_empty());
    }

    #[tokio::test]
    async fn test_results_merged_into_context() {
        let mut results = Map::new();
        results.insert("total".into(), json!(42));
        let sandbox = MockSandbox::returning(results);
        let mut ctx = context(json!({"total": 1, "name": "Awa"}));

        let r = python_script(NodeId::Int(7), &script("results['total'] = 42"), &sandbox, &mut ctx).await;

        assert!(r.success);
        assert_eq!(r.message, "Script Python exécuté avec succès");
        assert_eq!(r.data["total"], json!(42));
        assert_eq!(ctx.get("total"), Some(&json!(42)));
        assert_eq!(ctx.get_str("name"), Some("Awa"));
        assert_eq!(sandbox.scripts(), vec!["results['total'] = 42"]);
    }

    #[tokio::test]
    async fn test_context_mutations_kept_on_error() {
        let sandbox = MockSandbox::new(|_, ctx| {
            let mut context = ctx.clone();
            context.insert("step".into(), json!("avant"));
            context.remove("drop");
            let mut results = Map::new();
            results.insert("ignored".into(), json!(true));
            Ok(ScriptOutcome {
                context,
                results,
                error: Some("name 'x' is not defined".into()),
            })
        });
        let mut ctx = context(json!({"drop": 1}));

        let r = python_script(NodeId::Int(7), &script("context['step'] = 'avant'\nx"), &sandbox, &mut ctx).await;

        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("Erreur Python: name 'x' is not defined"));
        assert_eq!(ctx.get_str("step"), Some("avant"));
        assert!(ctx.get("drop").is_none());
        assert!(ctx.get("ignored").is_none());
    }

    #[tokio::test]
    async fn test_sandbox_error_is_node_failure() {
        let sandbox = MockSandbox::new(|_, _| Err(WozifError::SandboxTimeout(10)));
        let mut ctx = context(json!({"a": 1}));
        let r = python_script(NodeId::Int(7), &script("while True: pass"), &sandbox, &mut ctx).await;
        assert!(!r.success);
        assert!(r.error.unwrap().starts_with("Erreur Python: "));
        assert_eq!(ctx.get("a"), Some(&json!(1)));
    }
}
