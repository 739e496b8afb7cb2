//! `parley-router` — two-tier request routing (C7), per-route generator
//! dispatch (C8), and reply post-processing (C9).
//!
//! [`Router::route_request`] classifies one trigger message and extracts
//! its route-specific parameters; [`GeneratorDispatch::dispatch`] turns
//! that into a final reply by fetching context, building the prompt, and
//! calling the right provider chain; [`ResponsePostProcessor`] shrinks
//! anything that comes back too long for the target platform.

pub mod dispatch;
pub mod error;
pub mod language;
pub mod postprocess;
pub mod route;
pub mod router;

pub use dispatch::{
    pin_and_compose, pin_and_compose_provider, BackendSlot, ConversationWindow, GeneratorDispatch, UserResolver,
    SENTINEL_ARTICLE_USER_ID,
};
pub use error::{Result, RouterError};
pub use language::LanguageDetector;
pub use postprocess::ResponsePostProcessor;
pub use route::{
    devils_advocate_response_schema, fact_params_schema, famous_params_schema, general_params_schema,
    memory_forget_schema, memory_update_schema, route_selection_schema, wisdom_response_schema, AiBackend,
    DevilsAdvocateResponse, FactOperation, FactParams, FamousParams, GeneralParams, LanguageTag,
    MemoryForgetResponse, MemoryUpdateResponse, Route, RouteParameters, RouteSelection, WisdomResponse,
};
pub use router::{is_notsure_response, Router, RouteOutcome, RouterMetrics, RoutedRequest};
