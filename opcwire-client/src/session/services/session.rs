//! Session services: CreateSession, ActivateSession and CloseSession, with the identity
//! token wrapping that activation requires.

use std::sync::Arc;

use log::warn;

use opcwire_core::ResponseMessage;
use opcwire_types::{
    ActivateSessionRequest, AnonymousIdentityToken, ByteString, CloseSessionRequest,
    CreateSessionRequest, Error, ExtensionObject, Guid, IssuedIdentityToken, NodeId,
    SignatureData, StatusCode, UAString, UserNameIdentityToken, UserTokenPolicy, UserTokenType,
    X509IdentityToken,
};

use crate::config::IdentityToken;
use crate::session::{
    process_service_result, process_unexpected_response, session_debug, Session,
};

impl Session {
    /// Create a session on the server, storing the session id and the authentication
    /// token for every later request.
    pub(crate) async fn create_session(&self) -> Result<(), Error> {
        let request = CreateSessionRequest {
            request_header: Default::default(),
            client_description: self.application_description.clone(),
            server_uri: UAString::null(),
            endpoint_url: UAString::from(self.endpoint_url.as_str()),
            session_name: self.session_name.clone(),
            client_nonce: client_nonce(),
            client_certificate: ByteString::null(),
            requested_session_timeout: self.requested_session_timeout,
            max_response_message_size: 0,
        };

        let response = self.send(request).await?;
        match response {
            ResponseMessage::CreateSession(response) => {
                process_service_result(&response.response_header)?;
                if response.session_id.is_null() || response.authentication_token.is_null() {
                    return Err(Error::new(
                        StatusCode::BadUnexpectedError,
                        "Server returned a null session id or authentication token",
                    ));
                }
                session_debug!(self, "Created session {}", response.session_id);
                self.session_id.store(Arc::new(response.session_id));
                self.auth_token
                    .store(Arc::new(response.authentication_token));

                // Remember the identity policies of the matching endpoint, so the
                // activation can name the policy id the server expects
                let policies = response
                    .server_endpoints
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|e| e.endpoint_url.as_ref() == self.endpoint_url)
                    .flat_map(|e| e.user_identity_tokens.unwrap_or_default())
                    .collect();
                *self.user_token_policies.lock() = policies;
                Ok(())
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Activate the session with the configured user identity. The stored
    /// authentication token is the sole authorization of every other call.
    pub(crate) async fn activate_session(&self) -> Result<(), Error> {
        let request = ActivateSessionRequest {
            request_header: Default::default(),
            client_signature: SignatureData::default(),
            client_software_certificates: None,
            locale_ids: None,
            user_identity_token: self.make_user_identity_token(),
            user_token_signature: SignatureData::default(),
        };

        let response = self.send(request).await?;
        match response {
            ResponseMessage::ActivateSession(response) => {
                process_service_result(&response.response_header)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Close the session on the server. The caller decides whether the server should
    /// also drop the session's subscriptions.
    pub(crate) async fn close_session(&self, delete_subscriptions: bool) -> Result<(), Error> {
        let request = CloseSessionRequest {
            request_header: Default::default(),
            delete_subscriptions,
        };

        let response = self.send(request).await;
        // The token is gone regardless of whether the server answered
        self.auth_token.store(Arc::new(NodeId::null()));
        match response? {
            ResponseMessage::CloseSession(response) => {
                process_service_result(&response.response_header)
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// The configured identity, wrapped in an extension object as activation expects.
    fn make_user_identity_token(&self) -> ExtensionObject {
        match &self.user_identity_token {
            IdentityToken::Anonymous => ExtensionObject::from_message(&AnonymousIdentityToken {
                policy_id: self.policy_id_for(UserTokenType::Anonymous, "anonymous"),
            }),
            IdentityToken::UserName { user, password } => {
                // With security mode None the password travels unencrypted; secured
                // modes will fill in the encryption algorithm
                ExtensionObject::from_message(&UserNameIdentityToken {
                    policy_id: self.policy_id_for(UserTokenType::UserName, "username"),
                    user_name: UAString::from(user.as_str()),
                    password: ByteString::from(password.as_bytes()),
                    encryption_algorithm: UAString::null(),
                })
            }
            IdentityToken::X509 { certificate_der } => {
                ExtensionObject::from_message(&X509IdentityToken {
                    policy_id: self.policy_id_for(UserTokenType::Certificate, "certificate"),
                    certificate_data: ByteString::from(certificate_der.clone()),
                })
            }
            IdentityToken::Issued { token_data } => {
                ExtensionObject::from_message(&IssuedIdentityToken {
                    policy_id: self.policy_id_for(UserTokenType::IssuedToken, "issuedtoken"),
                    token_data: ByteString::from(token_data.clone()),
                    encryption_algorithm: UAString::null(),
                })
            }
        }
    }

    /// The policy id the server advertised for `token_type`, or `fallback` when the
    /// server did not describe its endpoint.
    fn policy_id_for(&self, token_type: UserTokenType, fallback: &str) -> UAString {
        let policies = self.user_token_policies.lock();
        let policy: Option<&UserTokenPolicy> =
            policies.iter().find(|p| p.token_type == token_type);
        match policy {
            Some(policy) => policy.policy_id.clone(),
            None => {
                warn!(
                    "No user token policy for {:?} was advertised, using \"{}\"",
                    token_type, fallback
                );
                UAString::from(fallback)
            }
        }
    }
}

/// A fresh nonce for session creation. Security mode None does not verify it, but
/// servers reject sessions without one.
fn client_nonce() -> ByteString {
    let mut bytes = Vec::with_capacity(32);
    bytes.extend_from_slice(Guid::new().as_bytes());
    bytes.extend_from_slice(Guid::new().as_bytes());
    ByteString::from(bytes)
}
