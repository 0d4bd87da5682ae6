// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Session service types and the identity tokens wrapped at activation.

use super::{ua_binary_enum, ua_binary_struct, ua_message_info, MessageSecurityMode};
use crate::{
    byte_string::ByteString, diagnostic_info::DiagnosticInfo, extension_object::ExtensionObject,
    localized_text::LocalizedText, node_id::NodeId, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode, string::UAString,
};

ua_binary_struct! {
    /// The response sent when a service call fails as a whole. The interesting part is the
    /// service result in the header.
    pub struct ServiceFault {
        /// Common response header.
        pub response_header: ResponseHeader,
    }
}
ua_message_info!(ServiceFault, ServiceFault_Encoding_DefaultBinary);

ua_binary_enum! {
    /// The kind of OPC-UA application.
    pub enum ApplicationType {
        /// The application is a server.
        #[default]
        Server = 0,
        /// The application is a client.
        Client = 1,
        /// The application is both.
        ClientAndServer = 2,
        /// The application is a discovery server.
        DiscoveryServer = 3,
    }
}

ua_binary_struct! {
    /// Describes an application, sent by the client at session creation and returned by
    /// servers from discovery.
    pub struct ApplicationDescription {
        /// Globally unique application identifier.
        pub application_uri: UAString,
        /// Globally unique product identifier.
        pub product_uri: UAString,
        /// Human readable application name.
        pub application_name: LocalizedText,
        /// Server, client or both.
        pub application_type: ApplicationType,
        /// Gateway server URI, unused by this client.
        pub gateway_server_uri: UAString,
        /// Discovery profile URI, unused by this client.
        pub discovery_profile_uri: UAString,
        /// URLs the application can be discovered on.
        pub discovery_urls: Option<Vec<UAString>>,
    }
}

ua_binary_enum! {
    /// The kind of user identity token a policy accepts.
    pub enum UserTokenType {
        /// No token required.
        #[default]
        Anonymous = 0,
        /// User name and password.
        UserName = 1,
        /// X509 certificate.
        Certificate = 2,
        /// Token issued by an external authority.
        IssuedToken = 3,
    }
}

ua_binary_struct! {
    /// A user identity policy supported by an endpoint.
    pub struct UserTokenPolicy {
        /// Identifier for the policy, echoed in identity tokens.
        pub policy_id: UAString,
        /// The kind of token the policy accepts.
        pub token_type: UserTokenType,
        /// The type of issued token, when the token type is IssuedToken.
        pub issued_token_type: UAString,
        /// The endpoint of the token issuer.
        pub issuer_endpoint_url: UAString,
        /// Security policy used to encrypt the token.
        pub security_policy_uri: UAString,
    }
}

ua_binary_struct! {
    /// Describes an endpoint of a server.
    pub struct EndpointDescription {
        /// The URL of the endpoint.
        pub endpoint_url: UAString,
        /// The server the endpoint belongs to.
        pub server: ApplicationDescription,
        /// The server certificate.
        pub server_certificate: ByteString,
        /// The security mode of the endpoint.
        pub security_mode: MessageSecurityMode,
        /// The security policy URI of the endpoint.
        pub security_policy_uri: UAString,
        /// The user identity policies the endpoint accepts.
        pub user_identity_tokens: Option<Vec<UserTokenPolicy>>,
        /// The transport profile URI.
        pub transport_profile_uri: UAString,
        /// Relative security level of the endpoint.
        pub security_level: u8,
    }
}

ua_binary_struct! {
    /// A digital signature.
    pub struct SignatureData {
        /// The algorithm used.
        pub algorithm: UAString,
        /// The signature bytes.
        pub signature: ByteString,
    }
}

ua_binary_struct! {
    /// A software certificate with a signature.
    pub struct SignedSoftwareCertificate {
        /// The certificate data.
        pub certificate_data: ByteString,
        /// The signature over the data.
        pub signature: ByteString,
    }
}

ua_binary_struct! {
    /// Creates a session on the server.
    pub struct CreateSessionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Description of the client application.
        pub client_description: ApplicationDescription,
        /// The URI of the server the client expects to talk to.
        pub server_uri: UAString,
        /// The endpoint URL the client connected to.
        pub endpoint_url: UAString,
        /// Human readable session name.
        pub session_name: UAString,
        /// Client nonce for signature validation in secured modes.
        pub client_nonce: ByteString,
        /// The client certificate, null when unsecured.
        pub client_certificate: ByteString,
        /// Requested session idle timeout in milliseconds.
        pub requested_session_timeout: f64,
        /// The largest response the client accepts, 0 for no limit.
        pub max_response_message_size: u32,
    }
}
ua_message_info!(CreateSessionRequest, CreateSessionRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to CreateSession.
    pub struct CreateSessionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// The public identifier of the session.
        pub session_id: NodeId,
        /// The secret token authorizing requests within the session.
        pub authentication_token: NodeId,
        /// The session timeout granted by the server, in milliseconds.
        pub revised_session_timeout: f64,
        /// Server nonce for signature validation in secured modes.
        pub server_nonce: ByteString,
        /// The server certificate.
        pub server_certificate: ByteString,
        /// The endpoints of the server.
        pub server_endpoints: Option<Vec<EndpointDescription>>,
        /// Obsolete field, servers send an empty list.
        pub server_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        /// Signature over the client nonce and certificate.
        pub server_signature: SignatureData,
        /// The largest request the server accepts, 0 for no limit.
        pub max_request_message_size: u32,
    }
}
ua_message_info!(CreateSessionResponse, CreateSessionResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Activates a session, supplying the user identity.
    pub struct ActivateSessionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Signature over the server nonce and certificate, absent when unsecured.
        pub client_signature: SignatureData,
        /// Obsolete field, clients send an empty list.
        pub client_software_certificates: Option<Vec<SignedSoftwareCertificate>>,
        /// The locales the client prefers, in priority order.
        pub locale_ids: Option<Vec<UAString>>,
        /// The user identity token, wrapped in an extension object.
        pub user_identity_token: ExtensionObject,
        /// Signature with the secret of the identity token, absent when unsecured.
        pub user_token_signature: SignatureData,
    }
}
ua_message_info!(ActivateSessionRequest, ActivateSessionRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to ActivateSession.
    pub struct ActivateSessionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// Server nonce for the next activation.
        pub server_nonce: ByteString,
        /// Per-certificate results, empty for this client.
        pub results: Option<Vec<StatusCode>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(ActivateSessionResponse, ActivateSessionResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Closes a session.
    pub struct CloseSessionRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Also delete the session's subscriptions.
        pub delete_subscriptions: bool,
    }
}
ua_message_info!(CloseSessionRequest, CloseSessionRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to CloseSession.
    pub struct CloseSessionResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
    }
}
ua_message_info!(CloseSessionResponse, CloseSessionResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// An identity token for an anonymous user.
    pub struct AnonymousIdentityToken {
        /// The id of the policy the token satisfies.
        pub policy_id: UAString,
    }
}
ua_message_info!(AnonymousIdentityToken, AnonymousIdentityToken_Encoding_DefaultBinary);

ua_binary_struct! {
    /// An identity token carrying a user name and password.
    pub struct UserNameIdentityToken {
        /// The id of the policy the token satisfies.
        pub policy_id: UAString,
        /// The user name.
        pub user_name: UAString,
        /// The password, encrypted as the policy requires. Plain text when unsecured.
        pub password: ByteString,
        /// The algorithm the password is encrypted with.
        pub encryption_algorithm: UAString,
    }
}
ua_message_info!(UserNameIdentityToken, UserNameIdentityToken_Encoding_DefaultBinary);

ua_binary_struct! {
    /// An identity token carrying an X509 certificate.
    pub struct X509IdentityToken {
        /// The id of the policy the token satisfies.
        pub policy_id: UAString,
        /// The DER encoded certificate.
        pub certificate_data: ByteString,
    }
}
ua_message_info!(X509IdentityToken, X509IdentityToken_Encoding_DefaultBinary);

ua_binary_struct! {
    /// An identity token issued by an external authority.
    pub struct IssuedIdentityToken {
        /// The id of the policy the token satisfies.
        pub policy_id: UAString,
        /// The token data, encrypted as the policy requires.
        pub token_data: ByteString,
        /// The algorithm the token is encrypted with.
        pub encryption_algorithm: UAString,
    }
}
ua_message_info!(IssuedIdentityToken, IssuedIdentityToken_Encoding_DefaultBinary);
