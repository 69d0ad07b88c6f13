/*
Just enough of the blob service to hand the hub a writable place for
export output: make sure a container exists, then sign a time-limited URI
that grants access to it.
*/

mod blob;
mod signature;

pub use blob::{BlobService, StorageError};
pub use signature::{CONTAINER_PERMISSIONS, SAS_VERSION, container_sas, shared_key_signature};

use hubkit_util as util;
