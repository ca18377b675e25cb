//! Relay state machine
//!
//! `Validating → ConfigResolving → Requesting → Streaming → Finalizing →
//! {Completed | Failed}`. Validation runs in the route handler, before the
//! SSE headers are committed. Everything from `ConfigResolving` on happens
//! inside the response stream, so failures become in-band `error` events.
//!
//! The stream owns the provider connection and the audit entry. When the
//! client goes away the stream is dropped, which closes the provider
//! connection and records the entry as `aborted`.

use std::convert::Infallible;
use std::pin::Pin;
use std::time::Instant;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::audit::{AuditLog, LogDraft, LogOutcome, LogPolicy};
use crate::error::AppError;
use crate::provider::{ChatContext, CredentialResolver};
use crate::routes::metrics;
use crate::settings::RequestSettings;
use crate::streaming::{
    format_error_event, format_final_response, format_frame, provider_delta, SseFrameParser,
};
use crate::upstream::{UpstreamClient, UpstreamRequest};
use crate::usage::{UsageExtractor, UsageSummary};

use super::context::RelayContext;

/// Body of the client-facing SSE response
pub type RelayStream = Pin<Box<dyn Stream<Item = Result<Bytes, Infallible>> + Send>>;

/// One validated chat turn
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Opaque client-generated correlation id
    pub session_id: String,
    pub query: String,
    /// Caller context; carries the user and course ids
    pub context: ChatContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Validating,
    ConfigResolving,
    Requesting,
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

impl RelayState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayState::Completed | RelayState::Failed)
    }
}

fn advance(state: &mut RelayState, next: RelayState, ctx: &RelayContext) {
    debug!(trace_id = %ctx.trace_id, from = ?state, to = ?next, "Relay state");
    *state = next;
}

/// Drives one chat turn from credential resolution to the final event
#[derive(Clone)]
pub struct SessionRelay {
    resolver: CredentialResolver,
    upstream: UpstreamClient,
    audit: AuditLog,
}

impl SessionRelay {
    pub fn new(resolver: CredentialResolver, upstream: UpstreamClient, audit: AuditLog) -> Self {
        Self {
            resolver,
            upstream,
            audit,
        }
    }

    /// Start relaying. Nothing happens until the stream is polled.
    pub fn run(&self, request: ChatRequest, settings: RequestSettings) -> RelayStream {
        let relay = self.clone();

        Box::pin(async_stream::stream! {
            let started = Instant::now();
            let mut ctx = RelayContext::new(&request.context.user_id, &request.session_id)
                .with_course(request.context.course_id);
            let mut state = RelayState::Validating;
            ctx.log_request_start();

            advance(&mut state, RelayState::ConfigResolving, &ctx);
            let provider = match relay.resolver.resolve(&settings).await {
                Ok(provider) => provider,
                Err(e) => {
                    ctx.log_config_error(&e.to_string());
                    metrics::record_relay(&ctx.provider, "config_error", started.elapsed().as_secs_f64());
                    advance(&mut state, RelayState::Failed, &ctx);
                    yield Ok(format_error_event(e.sse_code(), &e.sse_message()));
                    return;
                }
            };
            ctx.set_provider(provider.kind().as_str());

            let payload = provider
                .provider()
                .build_payload(&request.query, &request.context);
            let upstream_request = match UpstreamRequest::new(&provider, &payload) {
                Ok(r) => r,
                Err(e) => {
                    ctx.log_error(&e.to_string());
                    metrics::record_relay(&ctx.provider, "error", started.elapsed().as_secs_f64());
                    advance(&mut state, RelayState::Failed, &ctx);
                    yield Ok(format_error_event(e.sse_code(), &e.sse_message()));
                    return;
                }
            };

            advance(&mut state, RelayState::Requesting, &ctx);
            let chat = settings.chat();
            let policy = LogPolicy::from(&chat);
            let mut log = relay
                .audit
                .open(
                    LogDraft {
                        session_id: request.session_id.clone(),
                        user_id: request.context.user_id.clone(),
                        course_id: request.context.course_id,
                        provider: ctx.provider.clone(),
                        bytes_up: upstream_request.bytes_up(),
                        query: request.query.clone(),
                        started,
                    },
                    policy,
                )
                .await;

            ctx.log_upstream_request(&upstream_request.endpoint, upstream_request.bytes_up());
            metrics::record_upstream_bytes("up", upstream_request.bytes_up());

            let mut body = match relay.upstream.send(&upstream_request).await {
                Ok(body) => body,
                Err(e) => {
                    ctx.log_error(&e.to_string());
                    metrics::record_relay(&ctx.provider, "error", started.elapsed().as_secs_f64());
                    advance(&mut state, RelayState::Failed, &ctx);
                    yield Ok(format_error_event(e.sse_code(), &e.sse_message()));
                    log.fail(e.to_string(), LogOutcome::default()).await;
                    return;
                }
            };

            advance(&mut state, RelayState::Streaming, &ctx);
            ctx.log_stream_started();

            let mut parser = SseFrameParser::new(provider_delta);
            let mut usage = UsageExtractor::new(started);
            let mut response_text = String::new();
            let mut frames = 0usize;
            let mut failure: Option<AppError> = None;

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                };

                for frame in parser.feed(&chunk) {
                    usage.observe(&frame);
                    if policy.log_content {
                        if let Some(delta) = &frame.delta {
                            response_text.push_str(delta);
                        }
                    }
                    frames += 1;
                    yield Ok(format_frame(&frame));
                }
                log.track(body.bytes_received(), usage.time_to_first_token_ms());
            }

            let bytes_down = body.bytes_received();
            log.track(bytes_down, usage.time_to_first_token_ms());
            metrics::record_upstream_bytes("down", bytes_down);

            let partial_usage = match usage.reported() {
                Some(reported) => Some(reported.clone()),
                None if usage.has_content() => Some(usage.summary()),
                None => None,
            };
            let outcome = LogOutcome {
                usage: partial_usage,
                response_content: policy.log_content.then_some(response_text),
            };

            if let Some(e) = failure {
                ctx.log_error(&e.to_string());
                metrics::record_relay(&ctx.provider, "error", started.elapsed().as_secs_f64());
                advance(&mut state, RelayState::Failed, &ctx);
                yield Ok(format_error_event(e.sse_code(), &e.sse_message()));
                log.fail(e.to_string(), outcome).await;
                return;
            }

            let tail = parser.discarded_tail();
            if !tail.is_empty() {
                ctx.log_discarded_tail(tail.len());
            }

            advance(&mut state, RelayState::Finalizing, &ctx);
            yield Ok(format_final_response());

            let summary = usage.summary();
            record_usage_metrics(&ctx.provider, &summary, usage.time_to_first_token_ms());
            ctx.log_request_complete(frames, summary.total_tokens, summary.approximate);
            log.complete(LogOutcome {
                usage: Some(summary),
                ..outcome
            })
            .await;

            metrics::record_relay(&ctx.provider, "completed", started.elapsed().as_secs_f64());
            advance(&mut state, RelayState::Completed, &ctx);
        })
    }
}

fn record_usage_metrics(provider: &str, summary: &UsageSummary, ttft_ms: Option<u64>) {
    if summary.approximate {
        metrics::record_tokens(provider, "approximate", summary.total_tokens.unwrap_or(0));
    } else {
        metrics::record_tokens(provider, "prompt", summary.prompt_tokens.unwrap_or(0));
        metrics::record_tokens(provider, "completion", summary.completion_tokens.unwrap_or(0));
    }
    if let Some(ms) = ttft_ms {
        metrics::record_time_to_first_token(provider, ms as f64 / 1000.0);
    }
}
