//! View services: Browse, BrowseNext and TranslateBrowsePathsToNodeIds.

use opcwire_core::ResponseMessage;
use opcwire_types::{
    BrowseDescription, BrowseNextRequest, BrowsePath, BrowsePathResult, BrowseRequest,
    BrowseResult, ByteString, Error, StatusCode, TranslateBrowsePathsToNodeIdsRequest,
    ViewDescription,
};

use crate::session::{
    process_service_result, process_unexpected_response, session_error, Session,
};

impl Session {
    /// Discover the references of nodes. Results correlate with `nodes_to_browse` by
    /// index; a result may carry a continuation point for [`Session::browse_next`].
    pub async fn browse(
        &self,
        nodes_to_browse: &[BrowseDescription],
        max_references_per_node: u32,
        view: Option<ViewDescription>,
    ) -> Result<Vec<BrowseResult>, Error> {
        if nodes_to_browse.is_empty() {
            session_error!(self, "browse may not be called with an empty list of nodes");
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "Nothing to browse",
            ));
        }

        let request = BrowseRequest {
            request_header: Default::default(),
            view: view.unwrap_or_default(),
            requested_max_references_per_node: max_references_per_node,
            nodes_to_browse: Some(nodes_to_browse.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::Browse(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.results.unwrap_or_default())
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Continue or release browses that returned a continuation point.
    pub async fn browse_next(
        &self,
        release_continuation_points: bool,
        continuation_points: &[ByteString],
    ) -> Result<Vec<BrowseResult>, Error> {
        if continuation_points.is_empty() {
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "Nothing to continue",
            ));
        }

        let request = BrowseNextRequest {
            request_header: Default::default(),
            release_continuation_points,
            continuation_points: Some(continuation_points.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::BrowseNext(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.results.unwrap_or_default())
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Resolve browse paths to node ids. Results correlate with `browse_paths` by index.
    pub async fn translate_browse_paths_to_node_ids(
        &self,
        browse_paths: &[BrowsePath],
    ) -> Result<Vec<BrowsePathResult>, Error> {
        if browse_paths.is_empty() {
            session_error!(
                self,
                "translate_browse_paths_to_node_ids may not be called with an empty list"
            );
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "Nothing to translate",
            ));
        }

        let request = TranslateBrowsePathsToNodeIdsRequest {
            request_header: Default::default(),
            browse_paths: Some(browse_paths.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::TranslateBrowsePathsToNodeIds(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.results.unwrap_or_default())
            }
            other => Err(process_unexpected_response(other)),
        }
    }
}
