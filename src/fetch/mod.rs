//! Outbound request handling: transport trait plus the strategy layer that
//! decides between network and cache per request class.

pub mod interceptor;
pub mod net;

pub use interceptor::{FetchInterceptor, InterceptedResponse, RequestClass, OFFLINE_BODY};
pub use net::{FetchedResponse, Fetcher, HttpFetcher, Method, OutboundRequest};
