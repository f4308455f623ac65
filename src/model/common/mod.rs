mod status;

pub use status::{Approval, ElectionStatus, Standing};
