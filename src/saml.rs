//! Reading AWS attributes out of a SAML assertion.

use std::fmt;

use base64::Engine;

const ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";
const SESSION_DURATION_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/SessionDuration";

#[derive(Debug, thiserror::Error)]
pub enum SamlError {
    #[error("SAML assertion is not valid base64")]
    Base64(#[from] base64::DecodeError),
    #[error("SAML assertion is not UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("SAML assertion is not valid XML")]
    Xml(#[from] roxmltree::Error),
    #[error("invalid role value {0:?}")]
    InvalidRole(String),
    #[error("no AWS roles found in SAML assertion")]
    NoRoles,
}

/// An IAM role the assertion allows assuming, with its SAML provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsRole {
    pub role_arn: String,
    pub principal_arn: String,
    pub name: String,
}

impl AwsRole {
    /// Parse a `principal,role` value; either order is accepted.
    pub fn parse(value: &str) -> Result<Self, SamlError> {
        let invalid = || SamlError::InvalidRole(value.to_string());

        let (first, second) = value.split_once(',').ok_or_else(invalid)?;
        let (first, second) = (first.trim(), second.trim());
        if second.contains(',') {
            return Err(invalid());
        }

        let (role_arn, principal_arn) = if is_role(first) && is_provider(second) {
            (first, second)
        } else if is_role(second) && is_provider(first) {
            (second, first)
        } else {
            return Err(invalid());
        };

        let name = role_arn.rsplit('/').next().unwrap_or(role_arn);
        Ok(Self {
            role_arn: role_arn.to_string(),
            principal_arn: principal_arn.to_string(),
            name: name.to_string(),
        })
    }

    /// Account segment of the role ARN (`arn:aws:iam::<account>:role/...`).
    pub fn account_id(&self) -> Option<&str> {
        self.role_arn.split(':').nth(4).filter(|id| !id.is_empty())
    }
}

impl fmt::Display for AwsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role_arn)
    }
}

fn is_role(arn: &str) -> bool {
    arn.contains(":role/")
}

fn is_provider(arn: &str) -> bool {
    arn.contains(":saml-provider/")
}

/// A decoded assertion document.
#[derive(Debug, Clone)]
pub struct Assertion {
    xml: String,
}

impl Assertion {
    /// Decode the base64 form produced by the sign-in flow.
    pub fn decode(encoded: &str) -> Result<Self, SamlError> {
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
        let xml = String::from_utf8(bytes)?;
        roxmltree::Document::parse(&xml)?;
        Ok(Self { xml })
    }

    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Every role the assertion grants, in document order.
    pub fn roles(&self) -> Result<Vec<AwsRole>, SamlError> {
        let roles = self
            .attribute_values(ROLE_ATTRIBUTE)?
            .iter()
            .map(|value| AwsRole::parse(value))
            .collect::<Result<Vec<_>, _>>()?;
        if roles.is_empty() {
            return Err(SamlError::NoRoles);
        }
        Ok(roles)
    }

    /// Maximum session length in seconds, when the IdP sets one.
    pub fn session_duration(&self) -> Result<Option<u64>, SamlError> {
        Ok(self
            .attribute_values(SESSION_DURATION_ATTRIBUTE)?
            .first()
            .and_then(|value| value.parse().ok()))
    }

    /// `Destination` of the `Response` element.
    pub fn destination(&self) -> Result<Option<String>, SamlError> {
        let doc = roxmltree::Document::parse(&self.xml)?;
        Ok(doc
            .descendants()
            .find(|node| node.has_tag_name("Response"))
            .and_then(|node| node.attribute("Destination"))
            .map(str::to_string))
    }

    fn attribute_values(&self, name: &str) -> Result<Vec<String>, SamlError> {
        let doc = roxmltree::Document::parse(&self.xml)?;
        Ok(doc
            .descendants()
            .filter(|node| node.has_tag_name("Attribute") && node.attribute("Name") == Some(name))
            .flat_map(|attribute| attribute.children())
            .filter(|node| node.has_tag_name("AttributeValue"))
            .filter_map(|value| value.text())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROVIDER: &str = "arn:aws:iam::123456789012:saml-provider/AzureAD";
    const ADMIN: &str = "arn:aws:iam::123456789012:role/Admin";
    const READ_ONLY: &str = "arn:aws:iam::210987654321:role/team/ReadOnly";

    fn encoded(xml: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(xml)
    }

    fn response(attributes: &str) -> String {
        format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" Destination="https://signin.aws.amazon.com/saml">
  <Assertion xmlns="urn:oasis:names:tc:SAML:2.0:assertion">
    <AttributeStatement>{attributes}</AttributeStatement>
  </Assertion>
</samlp:Response>"#
        )
    }

    #[test]
    fn test_roles_in_either_order() {
        let xml = response(&format!(
            r#"<Attribute Name="{ROLE_ATTRIBUTE}">
                 <AttributeValue>{ADMIN},{PROVIDER}</AttributeValue>
                 <AttributeValue> {PROVIDER}, {READ_ONLY} </AttributeValue>
               </Attribute>
               <Attribute Name="{SESSION_DURATION_ATTRIBUTE}"><AttributeValue>28800</AttributeValue></Attribute>"#
        ));
        let assertion = Assertion::decode(&encoded(&xml)).unwrap();

        let roles = assertion.roles().unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].role_arn, ADMIN);
        assert_eq!(roles[0].principal_arn, PROVIDER);
        assert_eq!(roles[0].name, "Admin");
        assert_eq!(roles[1].name, "ReadOnly");
        assert_eq!(roles[1].account_id(), Some("210987654321"));

        assert_eq!(assertion.session_duration().unwrap(), Some(28800));
        assert_eq!(
            assertion.destination().unwrap().as_deref(),
            Some("https://signin.aws.amazon.com/saml")
        );
    }

    #[test]
    fn test_missing_roles() {
        let assertion = Assertion::decode(&encoded(&response(""))).unwrap();
        assert!(matches!(assertion.roles(), Err(SamlError::NoRoles)));
        assert_eq!(assertion.session_duration().unwrap(), None);
    }

    #[test]
    fn test_invalid_role_value() {
        assert!(matches!(
            AwsRole::parse("arn:aws:iam::1:user/bob,arn:aws:iam::1:saml-provider/x"),
            Err(SamlError::InvalidRole(_))
        ));
        assert!(AwsRole::parse(ADMIN).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            Assertion::decode("not base64!"),
            Err(SamlError::Base64(_))
        ));
        assert!(matches!(
            Assertion::decode(&encoded("<unclosed>")),
            Err(SamlError::Xml(_))
        ));
    }

    #[test]
    fn test_display() {
        let role = AwsRole::parse(&format!("{ADMIN},{PROVIDER}")).unwrap();
        assert_eq!(role.to_string(), format!("Admin ({ADMIN})"));
    }
}
