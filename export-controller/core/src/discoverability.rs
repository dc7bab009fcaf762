use crate::ClusterId;

/// Process-wide switches controlling multi-cluster discovery.
///
/// Set once at startup. Decisions take a snapshot by reference so that tests may construct
/// arbitrary configurations without touching shared state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Switches {
    /// When false, exports are inert and every endpoint is cluster-local.
    pub mcs_discovery_enabled: bool,

    /// When true, exports are ignored and every endpoint is cluster-local.
    pub cluster_local_override: bool,
}

/// Describes which proxies may discover an endpoint.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Discoverability {
    /// Only proxies in the endpoint's cluster.
    ClusterLocal,

    /// Proxies in any cluster.
    MeshWide,
}

/// Determines whether an endpoint registered in `origin` is visible to a proxy in `requesting`.
///
/// A proxy in the endpoint's own cluster can always see it, regardless of export state or
/// switches. Otherwise the endpoint is visible only if its service is exported and exports are in
/// effect.
pub fn visible(
    origin: &ClusterId,
    exported: bool,
    switches: &Switches,
    requesting: &ClusterId,
) -> bool {
    Discoverability::new(exported, switches).is_discoverable(origin, requesting)
}

// === impl Switches ===

impl Switches {
    /// Indicates whether export records have any effect on discoverability.
    pub fn exports_in_effect(&self) -> bool {
        self.mcs_discovery_enabled && !self.cluster_local_override
    }
}

// === impl Discoverability ===

impl Discoverability {
    pub fn new(exported: bool, switches: &Switches) -> Self {
        if exported && switches.exports_in_effect() {
            Self::MeshWide
        } else {
            Self::ClusterLocal
        }
    }

    pub fn is_discoverable(&self, origin: &ClusterId, requesting: &ClusterId) -> bool {
        origin == requesting || *self == Self::MeshWide
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mk_switches(mcs_discovery_enabled: bool, cluster_local_override: bool) -> Switches {
        Switches {
            mcs_discovery_enabled,
            cluster_local_override,
        }
    }

    #[rstest]
    fn same_cluster_always_visible(
        #[values(false, true)] exported: bool,
        #[values(false, true)] mcs_discovery_enabled: bool,
        #[values(false, true)] cluster_local_override: bool,
    ) {
        let c1 = ClusterId::from("c1");
        let switches = mk_switches(mcs_discovery_enabled, cluster_local_override);
        assert!(visible(&c1, exported, &switches, &c1.clone()));
    }

    #[rstest]
    fn unexported_never_visible_across_clusters(
        #[values(false, true)] mcs_discovery_enabled: bool,
        #[values(false, true)] cluster_local_override: bool,
    ) {
        let switches = mk_switches(mcs_discovery_enabled, cluster_local_override);
        assert!(!visible(
            &ClusterId::from("c1"),
            false,
            &switches,
            &ClusterId::from("c2"),
        ));
    }

    #[test]
    fn exported_visible_across_clusters() {
        assert!(visible(
            &ClusterId::from("c1"),
            true,
            &mk_switches(true, false),
            &ClusterId::from("c2"),
        ));
    }

    #[rstest]
    #[case::discovery_disabled(mk_switches(false, false))]
    #[case::cluster_local_override(mk_switches(true, true))]
    #[case::both(mk_switches(false, true))]
    fn exported_suppressed_by_switches(#[case] switches: Switches) {
        assert!(!visible(
            &ClusterId::from("c1"),
            true,
            &switches,
            &ClusterId::from("c2"),
        ));
    }

    #[test]
    fn classification() {
        assert_eq!(
            Discoverability::new(true, &mk_switches(true, false)),
            Discoverability::MeshWide
        );
        assert_eq!(
            Discoverability::new(true, &mk_switches(true, true)),
            Discoverability::ClusterLocal
        );
        assert_eq!(
            Discoverability::new(false, &mk_switches(true, false)),
            Discoverability::ClusterLocal
        );
        assert_eq!(Switches::default(), mk_switches(false, false));
    }
}
