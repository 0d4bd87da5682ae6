//! Attribute services: Read and Write.

use opcwire_core::ResponseMessage;
use opcwire_types::{
    DataValue, Error, ReadRequest, ReadValueId, StatusCode, TimestampsToReturn, WriteRequest,
    WriteValue,
};

use crate::session::{
    process_service_result, process_unexpected_response, session_error, Session,
};

impl Session {
    /// Read attributes of nodes. Results correlate with `nodes_to_read` by index.
    pub async fn read(
        &self,
        nodes_to_read: &[ReadValueId],
        timestamps_to_return: TimestampsToReturn,
        max_age: f64,
    ) -> Result<Vec<DataValue>, Error> {
        if nodes_to_read.is_empty() {
            session_error!(self, "read may not be called with an empty list of nodes");
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "Nothing to read",
            ));
        }

        let request = ReadRequest {
            request_header: Default::default(),
            max_age,
            timestamps_to_return,
            nodes_to_read: Some(nodes_to_read.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::Read(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.results.unwrap_or_default())
            }
            other => Err(process_unexpected_response(other)),
        }
    }

    /// Write values to attributes of nodes. Results correlate with `nodes_to_write` by
    /// index.
    pub async fn write(&self, nodes_to_write: &[WriteValue]) -> Result<Vec<StatusCode>, Error> {
        if nodes_to_write.is_empty() {
            session_error!(self, "write may not be called with an empty list of nodes");
            return Err(Error::new(
                StatusCode::BadNothingToDo,
                "Nothing to write",
            ));
        }

        let request = WriteRequest {
            request_header: Default::default(),
            nodes_to_write: Some(nodes_to_write.to_vec()),
        };
        match self.send(request).await? {
            ResponseMessage::Write(response) => {
                process_service_result(&response.response_header)?;
                Ok(response.results.unwrap_or_default())
            }
            other => Err(process_unexpected_response(other)),
        }
    }
}
