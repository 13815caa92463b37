use std::collections::VecDeque;
use std::sync::Mutex;

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use wozif_core::error::{Result, WozifError};
use wozif_core::prompt::{self, PromptVars};
use wozif_core::traits::{KnowledgeRetriever, ScriptOutcome, ScriptSandbox, TextGenerator};
use wozif_core::types::SourceRequest;

enum Scripted {
    Text(String),
    Failure(String),
}

/// Text generator that replays scripted replies in order and records every
/// rendered prompt.
#[derive(Default)]
pub struct MockTextGenerator {
    replies: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text reply.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Text(text.into()));
        self
    }

    /// Queue a JSON reply.
    pub fn with_json(self, value: Value) -> Self {
        self.push(Scripted::Text(value.to_string()));
        self
    }

    /// Queue a failed request.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Failure(message.into()));
        self
    }

    fn push(&self, reply: Scripted) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Rendered prompts seen so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn next_reply(&self, template: &str, vars: &PromptVars) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push(prompt::render(template, vars));
        match self.replies.lock().unwrap().pop_front() {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Failure(message)) => Err(WozifError::LlmRequest(message)),
            None => Err(WozifError::LlmRequest("no scripted reply left".into())),
        }
    }
}

impl TextGenerator for MockTextGenerator {
    fn generate<'a>(
        &'a self,
        template: &'a str,
        vars: &'a PromptVars,
    ) -> BoxFuture<'a, Result<String>> {
        let reply = self.next_reply(template, vars);
        Box::pin(async move { reply })
    }

    fn generate_json<'a>(
        &'a self,
        template: &'a str,
        vars: &'a PromptVars,
    ) -> BoxFuture<'a, Result<Value>> {
        let reply = self.next_reply(template, vars).and_then(|text| {
            let value: Value = serde_json::from_str(prompt::extract_json(&text))
                .map_err(|e| WozifError::LlmParse(e.to_string()))?;
            if value.is_object() {
                Ok(value)
            } else {
                Err(WozifError::LlmParse(format!("not a JSON object: {}", text)))
            }
        });
        Box::pin(async move { reply })
    }
}

/// A recorded knowledge service call.
#[derive(Debug, Clone, PartialEq)]
pub enum KnowledgeCall {
    Answer {
        question: String,
    },
    Sources {
        question: String,
        request: SourceRequest,
    },
    Custom {
        question: String,
        content: String,
    },
}

/// Knowledge service returning a fixed answer (or failing) and recording
/// every call.
pub struct MockKnowledge {
    answer: std::result::Result<String, String>,
    calls: Mutex<Vec<KnowledgeCall>>,
}

impl MockKnowledge {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Ok(answer.into()),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            answer: Err(message.into()),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn calls(&self) -> Vec<KnowledgeCall> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, call: KnowledgeCall) -> BoxFuture<'_, Result<String>> {
        self.calls.lock().unwrap().push(call);
        let result = self
            .answer
            .clone()
            .map_err(|message| WozifError::LlmRequest(message));
        Box::pin(async move { result })
    }
}

impl KnowledgeRetriever for MockKnowledge {
    fn answer<'a>(&'a self, question: &'a str) -> BoxFuture<'a, Result<String>> {
        self.respond(KnowledgeCall::Answer {
            question: question.to_string(),
        })
    }

    fn answer_with_sources<'a>(
        &'a self,
        question: &'a str,
        request: &'a SourceRequest,
    ) -> BoxFuture<'a, Result<String>> {
        self.respond(KnowledgeCall::Sources {
            question: question.to_string(),
            request: request.clone(),
        })
    }

    fn answer_with_custom_knowledge<'a>(
        &'a self,
        question: &'a str,
        content: &'a str,
    ) -> BoxFuture<'a, Result<String>> {
        self.respond(KnowledgeCall::Custom {
            question: question.to_string(),
            content: content.to_string(),
        })
    }
}

type SandboxFn = dyn Fn(&str, &Map<String, Value>) -> Result<ScriptOutcome> + Send + Sync;

/// Sandbox whose behavior is a closure over the script and context.
pub struct MockSandbox {
    handler: Box<SandboxFn>,
    scripts: Mutex<Vec<String>>,
}

impl MockSandbox {
    pub fn new(
        handler: impl Fn(&str, &Map<String, Value>) -> Result<ScriptOutcome> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            scripts: Mutex::new(vec![]),
        }
    }

    /// Sandbox that leaves the context untouched and returns `results`.
    pub fn returning(results: Map<String, Value>) -> Self {
        Self::new(move |_, context| {
            Ok(ScriptOutcome {
                context: context.clone(),
                results: results.clone(),
                error: None,
            })
        })
    }

    /// Scripts submitted so far.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

impl ScriptSandbox for MockSandbox {
    fn run<'a>(
        &'a self,
        script: &'a str,
        context: &'a Map<String, Value>,
    ) -> BoxFuture<'a, Result<ScriptOutcome>> {
        self.scripts.lock().unwrap().push(script.to_string());
        let outcome = (self.handler)(script, context);
        Box::pin(async move { outcome })
    }
}
