//! Picker dispatch: hand a create/open-document request to the environment.
//!
//! Dispatch is fire-and-forget. The environment shows its picker, returns
//! immediately, and later reports the user's choice as a [`ResultEvent`]
//! tagged with the token issued here.
//!
//! [`ResultEvent`]: crate::types::ResultEvent

use crate::error::BridgeError;
use crate::types::RequestToken;

/// Parameters for a "create document" picker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateDocument {
    pub file_name: String,
    pub mime_type: String,
}

/// Parameters for an "open document" picker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenDocument {
    pub mime_type: String,
    /// `None` means no extra filter
    pub extensions: Option<Vec<String>>,
}

/// The environment's document picker subsystem
pub trait DocumentPicker {
    /// Start a create-document surface. `Err` means it could not be shown.
    fn create_document(&mut self, token: RequestToken, request: &CreateDocument) -> Result<(), String>;

    /// Start an open-document surface. `Err` means it could not be shown.
    fn open_document(&mut self, token: RequestToken, request: &OpenDocument) -> Result<(), String>;
}

/// Issues tokens and starts pickers
#[derive(Debug)]
pub struct PickerDispatch {
    next_token: u64,
}

impl PickerDispatch {
    pub fn new() -> Self {
        Self { next_token: 1 }
    }

    fn issue(&mut self) -> RequestToken {
        let token = RequestToken(self.next_token);
        self.next_token += 1;
        token
    }

    pub fn dispatch_save<P: DocumentPicker + ?Sized>(
        &mut self,
        picker: &mut P,
        file_name: &str,
        mime_type: &str,
    ) -> Result<RequestToken, BridgeError> {
        let token = self.issue();
        let request = CreateDocument {
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
        };
        tracing::debug!(%token, file_name, mime_type, "starting create-document picker");
        picker
            .create_document(token, &request)
            .map_err(BridgeError::DispatchUnavailable)?;
        Ok(token)
    }

    pub fn dispatch_open<P: DocumentPicker + ?Sized>(
        &mut self,
        picker: &mut P,
        mime_type: &str,
        extensions: &[String],
    ) -> Result<RequestToken, BridgeError> {
        let token = self.issue();
        let request = OpenDocument {
            mime_type: mime_type.to_string(),
            extensions: extension_filter(extensions),
        };
        tracing::debug!(%token, mime_type, "starting open-document picker");
        picker
            .open_document(token, &request)
            .map_err(BridgeError::DispatchUnavailable)?;
        Ok(token)
    }
}

impl Default for PickerDispatch {
    fn default() -> Self {
        Self::new()
    }
}

/// An empty list or a leading `"*"` means "accept anything"
pub fn extension_filter(extensions: &[String]) -> Option<Vec<String>> {
    match extensions.first() {
        None => None,
        Some(first) if first == "*" => None,
        Some(_) => Some(extensions.to_vec()),
    }
}
