use thiserror::Error;

use crate::model::ItemError;
use crate::model::SessionStateError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Item(#[from] ItemError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
}
