// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! View service types, Browse and TranslateBrowsePathsToNodeIds.

use super::{ua_binary_enum, ua_binary_struct, ua_message_info};
use crate::{
    byte_string::ByteString, date_time::DateTime, diagnostic_info::DiagnosticInfo,
    expanded_node_id::ExpandedNodeId, localized_text::LocalizedText, node_id::NodeId,
    qualified_name::QualifiedName, request_header::RequestHeader,
    response_header::ResponseHeader, status_code::StatusCode,
};

ua_binary_enum! {
    /// The direction references are followed when browsing.
    pub enum BrowseDirection {
        /// Follow references in their natural direction.
        #[default]
        Forward = 0,
        /// Follow references backwards.
        Inverse = 1,
        /// Follow references both ways.
        Both = 2,
    }
}

ua_binary_enum! {
    /// The class of a node.
    pub enum NodeClass {
        /// No class specified.
        #[default]
        Unspecified = 0,
        /// An object node.
        Object = 1,
        /// A variable node.
        Variable = 2,
        /// A method node.
        Method = 4,
        /// An object type node.
        ObjectType = 8,
        /// A variable type node.
        VariableType = 16,
        /// A reference type node.
        ReferenceType = 32,
        /// A data type node.
        DataType = 64,
        /// A view node.
        View = 128,
    }
}

/// Values for `result_mask` in a browse description, selecting the fields filled into
/// reference descriptions.
pub struct BrowseDescriptionResultMask;

impl BrowseDescriptionResultMask {
    /// Include the reference type.
    pub const RESULT_MASK_REFERENCE_TYPE: u32 = 1;
    /// Include the direction flag.
    pub const RESULT_MASK_IS_FORWARD: u32 = 1 << 1;
    /// Include the node class.
    pub const RESULT_MASK_NODE_CLASS: u32 = 1 << 2;
    /// Include the browse name.
    pub const RESULT_MASK_BROWSE_NAME: u32 = 1 << 3;
    /// Include the display name.
    pub const RESULT_MASK_DISPLAY_NAME: u32 = 1 << 4;
    /// Include the type definition.
    pub const RESULT_MASK_TYPE_DEFINITION: u32 = 1 << 5;
    /// Include everything.
    pub const RESULT_MASK_ALL: u32 = Self::RESULT_MASK_REFERENCE_TYPE
        | Self::RESULT_MASK_IS_FORWARD
        | Self::RESULT_MASK_NODE_CLASS
        | Self::RESULT_MASK_BROWSE_NAME
        | Self::RESULT_MASK_DISPLAY_NAME
        | Self::RESULT_MASK_TYPE_DEFINITION;
}

ua_binary_struct! {
    /// The view a browse operates in. A null view id means the whole address space.
    pub struct ViewDescription {
        /// The node id of the view.
        pub view_id: NodeId,
        /// The time the view should reflect, null for now.
        pub timestamp: DateTime,
        /// The version of the view, 0 for the current one.
        pub view_version: u32,
    }
}

ua_binary_struct! {
    /// One node to browse and the filters to apply.
    pub struct BrowseDescription {
        /// The node to browse.
        pub node_id: NodeId,
        /// The direction to follow references.
        pub browse_direction: BrowseDirection,
        /// The reference type to follow, null for all.
        pub reference_type_id: NodeId,
        /// Also follow subtypes of the reference type.
        pub include_subtypes: bool,
        /// Bit mask of [`NodeClass`] values to include, 0 for all.
        pub node_class_mask: u32,
        /// Bit mask of [`BrowseDescriptionResultMask`] fields to return.
        pub result_mask: u32,
    }
}

ua_binary_struct! {
    /// A reference found when browsing.
    pub struct ReferenceDescription {
        /// The type of the reference.
        pub reference_type_id: NodeId,
        /// Whether the reference is in its natural direction.
        pub is_forward: bool,
        /// The target node.
        pub node_id: ExpandedNodeId,
        /// The browse name of the target.
        pub browse_name: QualifiedName,
        /// The display name of the target.
        pub display_name: LocalizedText,
        /// The class of the target.
        pub node_class: NodeClass,
        /// The type definition of the target, for objects and variables.
        pub type_definition: ExpandedNodeId,
    }
}

ua_binary_struct! {
    /// The references found for one browse description.
    pub struct BrowseResult {
        /// The status of the operation.
        pub status_code: StatusCode,
        /// Pass to BrowseNext to fetch the remainder, null when complete.
        pub continuation_point: ByteString,
        /// The references found.
        pub references: Option<Vec<ReferenceDescription>>,
    }
}

ua_binary_struct! {
    /// Discovers the references of nodes.
    pub struct BrowseRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The view to browse in.
        pub view: ViewDescription,
        /// The most references to return per node, 0 for no limit.
        pub requested_max_references_per_node: u32,
        /// The nodes to browse.
        pub nodes_to_browse: Option<Vec<BrowseDescription>>,
    }
}
ua_message_info!(BrowseRequest, BrowseRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to Browse, results correlate with the request by index.
    pub struct BrowseResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per browse description.
        pub results: Option<Vec<BrowseResult>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(BrowseResponse, BrowseResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// Continues or releases browses that returned a continuation point.
    pub struct BrowseNextRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// Release the continuation points instead of continuing.
        pub release_continuation_points: bool,
        /// The continuation points to continue or release.
        pub continuation_points: Option<Vec<ByteString>>,
    }
}
ua_message_info!(BrowseNextRequest, BrowseNextRequest_Encoding_DefaultBinary);

ua_binary_struct! {
    /// The response to BrowseNext.
    pub struct BrowseNextResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per continuation point.
        pub results: Option<Vec<BrowseResult>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(BrowseNextResponse, BrowseNextResponse_Encoding_DefaultBinary);

ua_binary_struct! {
    /// One hop of a relative path.
    pub struct RelativePathElement {
        /// The reference type to follow.
        pub reference_type_id: NodeId,
        /// Follow the reference backwards.
        pub is_inverse: bool,
        /// Also follow subtypes of the reference type.
        pub include_subtypes: bool,
        /// The browse name of the target, null for any on the final element.
        pub target_name: QualifiedName,
    }
}

ua_binary_struct! {
    /// A path through the address space following references by browse name.
    pub struct RelativePath {
        /// The hops of the path.
        pub elements: Option<Vec<RelativePathElement>>,
    }
}

ua_binary_struct! {
    /// A starting node and a relative path from it.
    pub struct BrowsePath {
        /// The node the path starts at.
        pub starting_node: NodeId,
        /// The path to follow.
        pub relative_path: RelativePath,
    }
}

ua_binary_struct! {
    /// A node a browse path resolved to.
    pub struct BrowsePathTarget {
        /// The target node.
        pub target_id: ExpandedNodeId,
        /// Index of the first unprocessed path element, `u32::MAX` when fully processed.
        pub remaining_path_index: u32,
    }
}

ua_binary_struct! {
    /// The targets one browse path resolved to.
    pub struct BrowsePathResult {
        /// The status of the operation.
        pub status_code: StatusCode,
        /// The nodes the path resolved to.
        pub targets: Option<Vec<BrowsePathTarget>>,
    }
}

ua_binary_struct! {
    /// Resolves browse paths to node ids.
    pub struct TranslateBrowsePathsToNodeIdsRequest {
        /// Common request header.
        pub request_header: RequestHeader,
        /// The paths to resolve.
        pub browse_paths: Option<Vec<BrowsePath>>,
    }
}
ua_message_info!(
    TranslateBrowsePathsToNodeIdsRequest,
    TranslateBrowsePathsToNodeIdsRequest_Encoding_DefaultBinary
);

ua_binary_struct! {
    /// The response to TranslateBrowsePathsToNodeIds, results correlate by index.
    pub struct TranslateBrowsePathsToNodeIdsResponse {
        /// Common response header.
        pub response_header: ResponseHeader,
        /// One result per browse path.
        pub results: Option<Vec<BrowsePathResult>>,
        /// Diagnostics for the results, when requested.
        pub diagnostic_infos: Option<Vec<DiagnosticInfo>>,
    }
}
ua_message_info!(
    TranslateBrowsePathsToNodeIdsResponse,
    TranslateBrowsePathsToNodeIdsResponse_Encoding_DefaultBinary
);
