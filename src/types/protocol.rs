//! Wire records for the direct-binary upload protocol.

use serde::Deserialize;

/// Response of a folder's `.initiateUpload.json` call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadResponse {
    /// URI to post the upload completion to; may be origin-relative.
    #[serde(rename = "completeURI", default)]
    pub complete_uri: Option<String>,
    /// Repository path of the folder.
    #[serde(default)]
    pub folder_path: Option<String>,
    /// Per-file upload descriptors; empty means the repository expects
    /// the create-asset-servlet fallback.
    #[serde(default)]
    pub files: Vec<InitiateUploadFile>,
}

/// Per-file entry of an initiate-upload response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateUploadFile {
    /// Pre-signed URIs, one PUT per part.
    #[serde(rename = "uploadURIs", default)]
    pub upload_uris: Vec<String>,
    /// Opaque token echoed back in the completion call.
    #[serde(default)]
    pub upload_token: Option<String>,
    /// Smallest part size the repository accepts.
    #[serde(default)]
    pub min_part_size: Option<u64>,
    /// Largest part size the repository accepts.
    #[serde(default)]
    pub max_part_size: Option<u64>,
    /// Content type the repository resolved for the file.
    #[serde(default)]
    pub mime_type: Option<String>,
}
