//! Azure AD sign-in for SAML federated AWS access.
//!
//! [`Authenticator`] drives the browser-style login conversation (password,
//! federation, MFA, interstitials) and returns the base64 SAML assertion.
//! [`saml::Assertion`] reads the AWS roles out of it.

pub mod config;
pub mod credentials;
pub mod duration;
pub mod error;
pub mod extract;
pub mod flow;
pub mod prompt;
pub mod saml;
pub mod transport;

pub use credentials::LoginCredentials;
pub use error::{AuthError, ErrorKind};
pub use flow::{AuthOptions, Authenticator, ClientOptions};
pub use prompt::Prompter;
