//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements          | Connects to                   |
//! |----------------|---------------------|-------------------------------|
//! | `wifi`         | NetworkPort         | ESP-IDF Wi-Fi STA / soft-AP   |
//! | `mdns`         | DiscoveryPort       | ESP-IDF mDNS responder        |
//! | `ota_listener` | UpdatePort          | TCP + OTA partition           |
//! | `telnet`       | ConsoleServer       | TCP (lwIP sockets)            |
//! | `beacon`       | BeaconPort          | UDP broadcast                 |
//! | `upload`       | UploadPort          | EspHttpServer + multer        |
//! | `fs`           | FilesystemPort      | SPIFFS via VFS / host dir     |
//! | `system`       | SystemPort          | heap, restart, eFuse MAC      |
//! | `nvs`          | ConfigPort          | NVS / in-memory store         |
//! |                | StoragePort         |                               |
//! | `log_sink`     | EventSink           | Serial log output             |
//!
//! `device_id` and `time` are helpers shared by the adapters and the binary.

pub mod beacon;
pub mod device_id;
pub mod fs;
pub mod log_sink;
pub mod mdns;
pub mod nvs;
pub mod ota_listener;
pub mod system;
pub mod telnet;
pub mod time;
pub mod upload;
pub mod wifi;
