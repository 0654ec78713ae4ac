use crate::extract;

/// Page types the sign-in conversation can produce.
///
/// [`Page::classify`] checks markers in declaration order and the first
/// match wins; real pages often carry several markers at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    ConvergedSignIn,
    ConvergedTfa,
    KmsiInterrupt,
    SamlRequestRelay,
    HiddenForm,
    Unrecognized,
}

impl Page {
    pub fn classify(body: &str) -> Self {
        if body.contains("ConvergedSignIn") {
            Page::ConvergedSignIn
        } else if body.contains("ConvergedTFA") {
            Page::ConvergedTfa
        } else if body.contains("KmsiInterrupt") {
            Page::KmsiInterrupt
        } else if body.contains("SAMLRequest") {
            Page::SamlRequestRelay
        } else if extract::has_hidden_form(body) {
            Page::HiddenForm
        } else {
            Page::Unrecognized
        }
    }

    /// Step name used in logs and error chains.
    pub fn name(self) -> &'static str {
        match self {
            Page::ConvergedSignIn => "ConvergedSignIn",
            Page::ConvergedTfa => "ConvergedTFA",
            Page::KmsiInterrupt => "KmsiInterrupt",
            Page::SamlRequestRelay => "SAMLRequest",
            Page::HiddenForm => "HiddenForm",
            Page::Unrecognized => "Unrecognized",
        }
    }
}
