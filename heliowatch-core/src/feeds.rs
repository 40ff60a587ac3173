//! The fixed catalogue of upstream feeds.
//!
//! Three scalar summaries and two still-image products, all served from the
//! same SWPC host. Keys are stable and double as directory and task names.

use std::fmt;

/// Default upstream host for every feed.
pub const DEFAULT_BASE_URL: &str = "https://services.swpc.noaa.gov";

/// A numeric field published by a scalar feed, as a host would display it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorDescriptor {
    /// Key in the upstream JSON object.
    pub field: &'static str,
    /// Human readable name.
    pub name: &'static str,
    /// Unit of measurement.
    pub unit: &'static str,
}

const MAG_FIELD_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor {
        field: "Bt",
        name: "Solar Wind Magnetic Fields Bt",
        unit: "nT",
    },
    SensorDescriptor {
        field: "Bz",
        name: "Solar Wind Magnetic Fields Bz",
        unit: "nT",
    },
];

const WIND_SPEED_SENSORS: &[SensorDescriptor] = &[SensorDescriptor {
    field: "WindSpeed",
    name: "Solar Wind Speed",
    unit: "km/sec",
}];

const FLUX_SENSORS: &[SensorDescriptor] = &[SensorDescriptor {
    field: "Flux",
    name: "Solar Activity (10.7cm Flux)",
    unit: "sfu",
}];

/// JSON summary endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarFeed {
    /// Interplanetary magnetic field, Bt and Bz.
    SolarWindMagField,
    /// Solar wind bulk speed.
    SolarWindSpeed,
    /// 10.7 cm radio flux.
    SolarActivityFlux,
}

impl ScalarFeed {
    /// Every scalar feed, in polling order.
    pub const ALL: [ScalarFeed; 3] = [
        ScalarFeed::SolarWindMagField,
        ScalarFeed::SolarWindSpeed,
        ScalarFeed::SolarActivityFlux,
    ];

    /// Stable identifier, also used as the task name.
    pub fn key(self) -> &'static str {
        match self {
            ScalarFeed::SolarWindMagField => "mag_field",
            ScalarFeed::SolarWindSpeed => "wind_speed",
            ScalarFeed::SolarActivityFlux => "activity",
        }
    }

    /// Endpoint path relative to the base URL.
    pub fn path(self) -> &'static str {
        match self {
            ScalarFeed::SolarWindMagField => {
                "products/summary/solar-wind-mag-field.json"
            }
            ScalarFeed::SolarWindSpeed => {
                "products/summary/solar-wind-speed.json"
            }
            ScalarFeed::SolarActivityFlux => "products/summary/10cm-flux.json",
        }
    }

    /// Fields this feed publishes.
    pub fn sensors(self) -> &'static [SensorDescriptor] {
        match self {
            ScalarFeed::SolarWindMagField => MAG_FIELD_SENSORS,
            ScalarFeed::SolarWindSpeed => WIND_SPEED_SENSORS,
            ScalarFeed::SolarActivityFlux => FLUX_SENSORS,
        }
    }

    /// Inverse of [`ScalarFeed::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feed| feed.key() == key)
    }
}

impl fmt::Display for ScalarFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Still-image endpoints that feed an animated archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFeed {
    /// GOES SUVI, 304 Å channel.
    Suvi304,
    /// SOHO LASCO C3 coronagraph.
    LascoC3,
}

impl ImageFeed {
    /// Every image feed.
    pub const ALL: [ImageFeed; 2] = [ImageFeed::Suvi304, ImageFeed::LascoC3];

    /// Stable identifier; names the task, the frame directory and the
    /// mirrored GIF.
    pub fn key(self) -> &'static str {
        match self {
            ImageFeed::Suvi304 => "suvi_304",
            ImageFeed::LascoC3 => "lasco_c3",
        }
    }

    /// Endpoint path relative to the base URL.
    pub fn path(self) -> &'static str {
        match self {
            ImageFeed::Suvi304 => "images/animations/suvi/primary/304/latest.png",
            ImageFeed::LascoC3 => "images/animations/lasco-c3/latest.jpg",
        }
    }

    /// Human readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            ImageFeed::Suvi304 => "Suvi 304 Image",
            ImageFeed::LascoC3 => "Lasco C3 Image",
        }
    }

    /// `Accept` header sent upstream.
    pub fn accept(self) -> &'static str {
        match self {
            ImageFeed::Suvi304 => "image/png",
            ImageFeed::LascoC3 => "image/jpeg",
        }
    }

    /// Extension used for archived frame files.
    ///
    /// Every feed archives as `png` regardless of the upstream encoding;
    /// frames are decoded by content, not by name.
    pub fn frame_extension(self) -> &'static str {
        "png"
    }

    /// File name of the mirrored animation.
    pub fn sequence_file_name(self) -> String {
        format!("{}.gif", self.key())
    }

    /// Inverse of [`ImageFeed::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feed| feed.key() == key)
    }
}

impl fmt::Display for ImageFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Join a base host and a feed path without doubling or dropping slashes.
pub fn feed_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_normalises_slashes() {
        assert_eq!(
            feed_url(
                "https://services.swpc.noaa.gov/",
                ScalarFeed::SolarWindSpeed.path()
            ),
            "https://services.swpc.noaa.gov/products/summary/solar-wind-speed.json"
        );
        assert_eq!(
            feed_url("http://localhost:8080", "/images/x.png"),
            "http://localhost:8080/images/x.png"
        );
    }

    #[test]
    fn keys_round_trip() {
        for feed in ScalarFeed::ALL {
            assert_eq!(ScalarFeed::from_key(feed.key()), Some(feed));
        }
        for feed in ImageFeed::ALL {
            assert_eq!(ImageFeed::from_key(feed.key()), Some(feed));
        }
        assert_eq!(ImageFeed::from_key("mag_field"), None);
    }

    #[test]
    fn mag_field_exposes_bt_and_bz() {
        let fields: Vec<_> = ScalarFeed::SolarWindMagField
            .sensors()
            .iter()
            .map(|s| s.field)
            .collect();
        assert_eq!(fields, vec!["Bt", "Bz"]);
        assert_eq!(ImageFeed::Suvi304.sequence_file_name(), "suvi_304.gif");
    }

    #[test]
    fn every_image_feed_archives_png_frames() {
        for feed in ImageFeed::ALL {
            assert_eq!(feed.frame_extension(), "png");
        }
        assert_eq!(ImageFeed::LascoC3.accept(), "image/jpeg");
    }
}
