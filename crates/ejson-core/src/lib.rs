//! Core contracts for ejson: the encrypted JSON store interface, its error
//! taxonomy, and the byte-oriented file system it reads and writes through.
//! Concrete cipher and disk implementations live in `ejson-storage`.

pub mod storage;
