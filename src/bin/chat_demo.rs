//! Interactive demo: type messages, see the selected reply and its scores.
//! Wired with mock providers, so no API keys or network needed.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use solace_chat_engine::arbiter::ResponseArbiter;
use solace_chat_engine::providers::{DynProvider, FixedReplyProvider};
use solace_chat_engine::script::{ScriptEngine, ScriptHandle};
use solace_chat_engine::transcript::Turn;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let script = ScriptHandle::new(ScriptEngine::load_or_builtin());
    let gemini: DynProvider = Arc::new(FixedReplyProvider::new(
        "gemini",
        "I hear you. Let's take this one step at a time. What feels heaviest right now?",
    ));
    let hugging_face: DynProvider = Arc::new(FixedReplyProvider::new(
        "huggingface",
        "That sounds difficult. Would you like to talk about what happened?",
    ));
    let arbiter = ResponseArbiter::new(script, gemini, hugging_face);

    let mut context: Vec<Turn> = Vec::new();

    println!("chat demo (mock providers). Type a message, empty line quits.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let message = line.trim();
        if message.is_empty() {
            break;
        }

        let best = arbiter.select_best_response("demo", message, &context).await;
        println!(
            "[{} {:.2}] {}",
            best.source.as_str(),
            best.confidence,
            best.text
        );
        let m = best.metrics;
        println!(
            "  relevance {:.2}  empathy {:.2}  actionability {:.2}  consistency {:.2}",
            m.context_relevance, m.emotional_support, m.actionability, m.consistency
        );

        context.push(Turn::user(message));
        context.push(Turn::bot_reply(&best));
    }

    println!("chat-demo done");
}
