use std::io::{ErrorKind, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// True when decoding stopped because the sequence ran out between items.
/// That is how a CBOR script or outcome file ends.
pub fn is_cbor_eof(err: &ciborium::de::Error<std::io::Error>) -> bool {
    matches!(err, ciborium::de::Error::Io(io_err) if io_err.kind() == ErrorKind::UnexpectedEof)
}

/// Read a stream of concatenated CBOR items until a clean EOF.
pub fn read_sequence<T: DeserializeOwned, R: Read>(
    mut reader: R,
) -> Result<Vec<T>, ciborium::de::Error<std::io::Error>> {
    let mut items = Vec::new();
    loop {
        match ciborium::from_reader::<T, _>(&mut reader) {
            Ok(item) => items.push(item),
            Err(e) if is_cbor_eof(&e) => return Ok(items),
            Err(e) => return Err(e),
        }
    }
}

/// Write each item as its own CBOR value, back to back.
pub fn write_sequence<T: Serialize, W: Write>(
    mut writer: W,
    items: &[T],
) -> Result<(), ciborium::ser::Error<std::io::Error>> {
    for item in items {
        ciborium::into_writer(item, &mut writer)?;
    }
    writer.flush().map_err(ciborium::ser::Error::Io)
}
