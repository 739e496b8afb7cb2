//! Two-tier request router (C7): tier 1 picks a `Route` while language
//! detection runs alongside it; tier 2 deterministically extracts that
//! route's parameters and stamps the detected language onto them.
//!
//! Grounded on `ai_router.py::AiRouter.route_request` almost line for line,
//! down to running tier-1 classification and language detection
//! concurrently (`asyncio.gather` -> `tokio::join!`) and only wrapping
//! tier-2 extraction in error-counted telemetry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::info;

use parley_providers::{structured, ChatRequest, ChatResponse, LlmProvider};

use crate::error::{Result, RouterError};
use crate::language::LanguageDetector;
use crate::route::{
    fact_params_schema, famous_params_schema, general_params_schema, route_selection_schema,
    FactParams, FamousParams, GeneralParams, Route, RouteParameters, RouteSelection,
};

const ROUTE_SELECTION_PROMPT: &str = r#"<system_instructions>
Decide exactly one route for the user message. Accuracy matters far more than speed: when in doubt, choose NOTSURE rather than guess. The message may be in any language — route on its meaning, not on keywords in a specific language.

If the message contains references to child sexual abuse, choose NONE immediately regardless of anything else.

Routes:
- FAMOUS: the user is asking what a specific named person (real, fictional, or historical) would say or do, phrased hypothetically ("what would X say about...", "how would X react to...").
- GENERAL: a genuine question or request addressed to the assistant that isn't about impersonating someone or storing/forgetting a fact. Questions that ask what the assistant remembers about a user belong here, not to FACT.
- FACT: an explicit imperative to remember or forget a specific fact about a named user ("remember that X likes tea", "forget that X lives in Berlin"). A question is never a FACT request.
- NONE: anything else — acknowledgments, reactions, talk about the assistant without addressing it, or disallowed content per the rule above.
- NOTSURE: the message is ambiguous, underspecified, or you are not confident which of the above applies.

Always include a short reason for the decision.
</system_instructions>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteOutcome {
    Success,
    Error,
}

/// In-process counters keyed by `(route, outcome, language_code)`, mirroring
/// the attributes the original router attached to its telemetry counter.
/// No external metrics crate: nothing else in this workspace's lineage
/// reaches for one, so a plain guarded map is the aligned choice.
#[derive(Default)]
pub struct RouterMetrics {
    counts: Mutex<HashMap<(Route, RouteOutcome, String), u64>>,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, route: Route, outcome: RouteOutcome, language_code: &str) {
        let mut counts = self.counts.lock().unwrap();
        *counts
            .entry((route, outcome, language_code.to_string()))
            .or_insert(0) += 1;
    }

    pub fn get(&self, route: Route, outcome: RouteOutcome, language_code: &str) -> u64 {
        self.counts
            .lock()
            .unwrap()
            .get(&(route, outcome, language_code.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Attempts to read a `RouteSelection` out of a raw, possibly
/// fence-wrapped, reply and reports whether it names the `NOTSURE` route.
/// An unparseable reply is not treated as bad here — that failure belongs
/// to the eventual `structured::generate` parse step, not to the
/// fallback-on-bad-route-decision policy this predicate implements.
///
/// Meant for `CompositeProvider::with_bad_response_predicate` when wiring
/// the router's own provider chain, mirroring
/// `container.py`'s `is_bad_response=lambda r: r.route == "NOTSURE"`.
pub fn is_notsure_response(resp: &ChatResponse) -> bool {
    let cleaned = strip_fences(&resp.content);
    match serde_json::from_str::<RouteSelection>(&cleaned) {
        Ok(selection) => selection.route == Route::NotSure,
        Err(_) => false,
    }
}

fn strip_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches('\n');
    match rest.rfind("```") {
        Some(end) => rest[..end].trim().to_string(),
        None => rest.trim().to_string(),
    }
}

fn parameter_extraction_prompt(route: Route) -> &'static str {
    match route {
        Route::Famous => {
            "Extract the name of the famous person (real, fictional, or historical) the user wants impersonated. Return just the name as commonly recognized."
        }
        Route::General => {
            "Extract the parameters for a general query: pick the best-suited ai_backend for the topic (gemini_flash for general questions, grok for creative tasks, claude for technical work, codex for research; gemma only if the user explicitly names it), a temperature appropriate to how factual vs. creative the request is, and cleaned_query with any bot-addressing prefix and routing instructions stripped out."
        }
        Route::Fact => {
            "Extract the memory operation: whether the user wants a fact remembered or forgotten, which user it's about (as a mention, id, or nickname, verbatim as written), and the fact content rewritten in the third person about that user."
        }
        Route::None | Route::NotSure => "",
    }
}

fn parameter_schema(route: Route) -> Option<Value> {
    match route {
        Route::Famous => Some(famous_params_schema()),
        Route::General => Some(general_params_schema()),
        Route::Fact => Some(fact_params_schema()),
        Route::None | Route::NotSure => None,
    }
}

/// The router (C7). `provider` is expected to already be wrapped with
/// whatever retry/fallback policy the deployment wants — this struct only
/// knows how to drive the two-tier classify/extract sequence.
pub struct Router {
    provider: Arc<dyn LlmProvider>,
    model: String,
    language_detector: Arc<LanguageDetector>,
    metrics: RouterMetrics,
}

/// The fully-resolved outcome of routing one message.
#[derive(Debug, Clone)]
pub struct RoutedRequest {
    pub route: Route,
    pub reason: String,
    pub language_code: String,
    pub language_name: String,
    pub parameters: RouteParameters,
}

impl Router {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        language_detector: Arc<LanguageDetector>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            language_detector,
            metrics: RouterMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    pub async fn route_request(&self, message: &str) -> Result<RoutedRequest> {
        let mut selection_req = ChatRequest::new(&self.model, ROUTE_SELECTION_PROMPT).with_user_message(message);
        selection_req.temperature = 0.0;
        selection_req.response_schema = Some(route_selection_schema());

        let (selection_result, language_code) = tokio::join!(
            structured::generate::<RouteSelection>(self.provider.as_ref(), selection_req),
            self.language_detector.detect_language(message)
        );
        let selection = selection_result?;

        info!(route = %selection.route, reason = %selection.reason, "tier-1 route selected");
        let language_name = self.language_detector.get_language_name(&language_code).await;

        let parameters = match self.extract_parameters(selection.route, message).await {
            Ok(params) => params,
            Err(e) => {
                self.metrics.record(selection.route, RouteOutcome::Error, &language_code);
                return Err(e);
            }
        };
        self.metrics.record(selection.route, RouteOutcome::Success, &language_code);

        let parameters = annotate_language(parameters, &language_code, &language_name);

        Ok(RoutedRequest {
            route: selection.route,
            reason: selection.reason,
            language_code,
            language_name,
            parameters,
        })
    }

    async fn extract_parameters(&self, route: Route, message: &str) -> Result<RouteParameters> {
        let Some(schema) = parameter_schema(route) else {
            return Ok(RouteParameters::None);
        };

        let mut req = ChatRequest::new(&self.model, parameter_extraction_prompt(route))
            .with_user_message(message);
        req.temperature = 0.0;
        req.response_schema = Some(schema);

        let parameters = match route {
            Route::Famous => {
                RouteParameters::Famous(structured::generate::<FamousParams>(self.provider.as_ref(), req).await?)
            }
            Route::General => {
                RouteParameters::General(structured::generate::<GeneralParams>(self.provider.as_ref(), req).await?)
            }
            Route::Fact => {
                RouteParameters::Fact(structured::generate::<FactParams>(self.provider.as_ref(), req).await?)
            }
            Route::None | Route::NotSure => RouteParameters::None,
        };
        Ok(parameters)
    }
}

fn annotate_language(parameters: RouteParameters, code: &str, name: &str) -> RouteParameters {
    match parameters {
        RouteParameters::Famous(mut p) => {
            p.language.language_code = Some(code.to_string());
            p.language.language_name = Some(name.to_string());
            RouteParameters::Famous(p)
        }
        RouteParameters::General(mut p) => {
            p.language.language_code = Some(code.to_string());
            p.language.language_name = Some(name.to_string());
            RouteParameters::General(p)
        }
        RouteParameters::Fact(mut p) => {
            p.language.language_code = Some(code.to_string());
            p.language.language_name = Some(name.to_string());
            RouteParameters::Fact(p)
        }
        RouteParameters::None => RouteParameters::None,
    }
}
