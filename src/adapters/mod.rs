//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements   | Connects to                    |
//! |-------------|--------------|--------------------------------|
//! | `audio`     | AudioPort    | HTTP WAV stream → I2S DAC      |
//! | `device_id` | -            | eFuse factory MAC              |
//! | `ini_store` | ConfigStore  | `/spiffs/config.ini`           |
//! | `log_sink`  | EventSink    | Serial log output              |
//! | `mqtt`      | BrokerPort   | ESP-MQTT client                |
//! | `sleep`     | PowerPort    | RTC timer + deep sleep         |
//! | `time`      | ClockPort    | ESP32 system timer             |
//! | `wifi`      | LinkPort     | ESP-IDF WiFi STA               |

pub mod audio;
pub mod device_id;
pub mod ini_store;
pub mod log_sink;
pub mod mqtt;
pub mod sleep;
pub mod time;
pub mod wifi;
