//! Dimension catalog: logical grouping/filter names mapped to the physical
//! accessor the fact fetcher understands, plus the auxiliary join each one
//! needs.

use serde::Serialize;

/// Auxiliary relations joined onto the visit facts on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxJoin {
    /// ip address → country, network organisation.
    Geo,
    /// user agent → device type, os, browser.
    Device,
}

/// Calendar/clock projections of the visit timestamp, evaluated in the
/// report timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockPart {
    Date,
    Hour,
    DayOfWeek,
}

/// Physical location of a dimension's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accessor {
    /// A column on the visit fact itself.
    Visit(&'static str),
    /// A column on the geo lookup relation.
    Geo(&'static str),
    /// A column on the device lookup relation.
    Device(&'static str),
    /// A projection of the local visit timestamp.
    Clock(ClockPart),
}

impl Accessor {
    pub const fn join(self) -> Option<AuxJoin> {
        match self {
            Accessor::Geo(_) => Some(AuxJoin::Geo),
            Accessor::Device(_) => Some(AuxJoin::Device),
            Accessor::Visit(_) | Accessor::Clock(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Channel,
    Subchannel,
    Country,
    Keyword,
    Iporg,
    DeviceType,
    Os,
    Browser,
    Date,
    Hour,
    DayOfWeek,
    LandingPage,
}

impl Dimension {
    /// Fallback for unrecognised `groupBy` names.
    pub const DEFAULT: Dimension = Dimension::Channel;

    pub const ALL: [Dimension; 12] = [
        Dimension::Channel,
        Dimension::Subchannel,
        Dimension::Country,
        Dimension::Keyword,
        Dimension::Iporg,
        Dimension::DeviceType,
        Dimension::Os,
        Dimension::Browser,
        Dimension::Date,
        Dimension::Hour,
        Dimension::DayOfWeek,
        Dimension::LandingPage,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Dimension::Channel => "channel",
            Dimension::Subchannel => "subchannel",
            Dimension::Country => "country",
            Dimension::Keyword => "keyword",
            Dimension::Iporg => "iporg",
            Dimension::DeviceType => "device_type",
            Dimension::Os => "os",
            Dimension::Browser => "browser",
            Dimension::Date => "date",
            Dimension::Hour => "hour",
            Dimension::DayOfWeek => "day_of_week",
            Dimension::LandingPage => "landing_page",
        }
    }

    pub const fn accessor(self) -> Accessor {
        match self {
            Dimension::Channel => Accessor::Visit("channel"),
            Dimension::Subchannel => Accessor::Visit("subchannel"),
            Dimension::Keyword => Accessor::Visit("keyword"),
            Dimension::LandingPage => Accessor::Visit("landing_page"),
            Dimension::Country => Accessor::Geo("country"),
            Dimension::Iporg => Accessor::Geo("iporg"),
            Dimension::DeviceType => Accessor::Device("device_type"),
            Dimension::Os => Accessor::Device("os"),
            Dimension::Browser => Accessor::Device("browser"),
            Dimension::Date => Accessor::Clock(ClockPart::Date),
            Dimension::Hour => Accessor::Clock(ClockPart::Hour),
            Dimension::DayOfWeek => Accessor::Clock(ClockPart::DayOfWeek),
        }
    }

    pub const fn join(self) -> Option<AuxJoin> {
        self.accessor().join()
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.name() == key)
    }

    /// Unknown names degrade to [`Dimension::DEFAULT`].
    pub fn parse_or_default(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            tracing::warn!(dimension = raw, fallback = Self::DEFAULT.name(), "Unknown groupBy dimension");
            Self::DEFAULT
        })
    }
}

/// Resolve a raw comma-separated `groupBy` into an ordered dimension list.
///
/// Unknown names degrade to the default, repeats keep their first position,
/// and the list is capped at `max` entries. An empty input yields the
/// default dimension alone.
pub fn resolve_dimensions(group_by: Option<&str>, max: usize) -> Vec<Dimension> {
    let mut dimensions: Vec<Dimension> = Vec::new();
    for raw in group_by.unwrap_or_default().split(',') {
        if raw.trim().is_empty() {
            continue;
        }
        let dimension = Dimension::parse_or_default(raw);
        if !dimensions.contains(&dimension) {
            dimensions.push(dimension);
        }
    }
    if dimensions.len() > max.max(1) {
        tracing::warn!(
            requested = dimensions.len(),
            max,
            "groupBy exceeds the dimension cap, extra dimensions dropped"
        );
        dimensions.truncate(max.max(1));
    }
    if dimensions.is_empty() {
        dimensions.push(Dimension::DEFAULT);
    }
    dimensions
}

/// Request fields that narrow the fact set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Channel,
    Subchannel,
    Country,
    Keyword,
    Iporg,
    /// Visits carrying at least one action of the given type.
    PageAction,
}

impl FilterField {
    pub const ALL: [FilterField; 6] = [
        FilterField::Channel,
        FilterField::Subchannel,
        FilterField::Country,
        FilterField::Keyword,
        FilterField::Iporg,
        FilterField::PageAction,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            FilterField::Channel => "channel",
            FilterField::Subchannel => "subchannel",
            FilterField::Country => "country",
            FilterField::Keyword => "keyword",
            FilterField::Iporg => "iporg",
            FilterField::PageAction => "page_action",
        }
    }

    /// The dimension this field filters on; `None` for action-level fields.
    pub const fn dimension(self) -> Option<Dimension> {
        match self {
            FilterField::Channel => Some(Dimension::Channel),
            FilterField::Subchannel => Some(Dimension::Subchannel),
            FilterField::Country => Some(Dimension::Country),
            FilterField::Keyword => Some(Dimension::Keyword),
            FilterField::Iporg => Some(Dimension::Iporg),
            FilterField::PageAction => None,
        }
    }

    pub const fn join(self) -> Option<AuxJoin> {
        match self.dimension() {
            Some(d) => d.join(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_dimension_round_trips_through_its_name() {
        for d in Dimension::ALL {
            assert_eq!(Dimension::parse(d.name()), Some(d));
        }
    }

    #[test]
    fn unknown_dimension_degrades_to_channel() {
        assert_eq!(Dimension::parse_or_default("planet"), Dimension::Channel);
        assert_eq!(Dimension::parse_or_default(" Country "), Dimension::Country);
    }

    #[test]
    fn joins_follow_the_accessor() {
        assert_eq!(Dimension::Country.join(), Some(AuxJoin::Geo));
        assert_eq!(Dimension::Browser.join(), Some(AuxJoin::Device));
        assert_eq!(Dimension::Channel.join(), None);
        assert_eq!(Dimension::Hour.join(), None);
        assert_eq!(FilterField::Iporg.join(), Some(AuxJoin::Geo));
        assert_eq!(FilterField::PageAction.join(), None);
    }

    #[test]
    fn resolve_dimensions_defaults_dedupes_and_caps() {
        assert_eq!(resolve_dimensions(None, 5), vec![Dimension::Channel]);
        assert_eq!(resolve_dimensions(Some(" , "), 5), vec![Dimension::Channel]);
        assert_eq!(
            resolve_dimensions(Some("country,bogus,country,os"), 5),
            vec![Dimension::Country, Dimension::Channel, Dimension::Os]
        );
        assert_eq!(
            resolve_dimensions(Some("channel,country,os,browser"), 2),
            vec![Dimension::Channel, Dimension::Country]
        );
    }
}
