/// Classification for failover policy.
///
/// Used by the router to decide what a failed attempt means for the
/// candidate loop and for the provider's circuit.
///
/// # Behavior Summary
///
/// | Class | Try Next Provider? | Record Circuit Breaker Failure? |
/// |-------|-------------------|--------------------------------|
/// | `Never` | No | No |
/// | `FailoverWithPenalty` | Yes | Yes (affects future requests) |
/// | `NextProvider` | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - bad ticker, configuration gap, or terminal failure.
    /// The request is fundamentally invalid and retrying won't help.
    Never,

    /// Failover to next provider and record a circuit breaker penalty.
    ///
    /// Used for transport-level trouble: timeouts, rate limiting, 5xx
    /// responses, and payloads that no longer match the expected schema.
    /// After enough of these the circuit opens and the provider is
    /// temporarily excluded from candidate lists.
    FailoverWithPenalty,

    /// Try next provider without recording any penalty.
    ///
    /// The provider answered, it just has nothing for this request (unknown
    /// symbol, empty range, unsupported operation). Another provider might.
    NextProvider,
}
