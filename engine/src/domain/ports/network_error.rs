//! Failure taxonomy shared by every network-backed port.

use super::define_port_error;

define_port_error! {
    /// Errors surfaced while calling a remote provider.
    pub enum NetworkError {
        /// Call exceeded its deadline.
        Timeout { message: String } =>
            "provider timeout: {message}"; retryable,
        /// Connection failed before a response arrived.
        Transport { message: String } =>
            "provider transport failed: {message}"; retryable,
        /// Provider answered with a 5xx status.
        ServerError { status: u16, message: String } =>
            "provider returned status {status}: {message}"; retryable,
        /// Provider rejected the request (4xx).
        Rejected { status: u16, message: String } =>
            "provider rejected request with status {status}: {message}",
        /// Response body could not be decoded.
        Decode { message: String } =>
            "provider response decode failed: {message}",
    }
}
