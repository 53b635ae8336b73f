//! Full-pipeline resolution tests over stub collaborators
//!
//! Exercises every listing source end to end: index scrape, the tag
//! API with defconfig resolution, and the paginated package catalog
//! with cache reconciliation.

use kres_core::fetch::packages::{PackageApi, Pagination, RepoPage, RhPackage};
use kres_core::fetch::tags::{TagApi, TagPage};
use kres_core::fetch::HttpFetch;
use kres_core::{
    ArtifactEntry, CustomConfig, DistroFamily, DistroVersion, Distribution, FileSource,
    KernelCache, KresError, Resolver, Status,
};
use std::collections::HashMap;

// ==================== Stub collaborators ====================

#[derive(Default)]
struct StubHttp {
    pages: HashMap<String, String>,
}

impl StubHttp {
    fn with(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
        }
    }
}

impl HttpFetch for StubHttp {
    async fn get_text(&self, url: &str) -> kres_core::Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| KresError::UpstreamFetch(format!("no stub page for {}", url)))
    }
}

/// Catalog stub that pages a fixed package list honestly, so the
/// stride fan-out sees realistic pagination.
#[derive(Default)]
struct StubCatalog {
    packages: Vec<RhPackage>,
}

impl PackageApi for StubCatalog {
    async fn list_page(&self, _repo: &str, offset: u64) -> kres_core::Result<RepoPage> {
        let start = (offset as usize).min(self.packages.len());
        let end = (start + 100).min(self.packages.len());
        let slice = self.packages[start..end].to_vec();
        Ok(RepoPage {
            pagination: Pagination {
                offset,
                limit: 100,
                count: slice.len() as u64,
            },
            packages: slice,
        })
    }

    async fn mint_download_url(&self, package: &RhPackage) -> kres_core::Result<String> {
        Ok(format!("https://signed.example/{}", package.file_name()))
    }
}

#[derive(Default)]
struct StubTags {
    pages: Vec<TagPage>,
}

impl TagApi for StubTags {
    async fn list_tags(&self, _owner: &str, _repo: &str, page: u32) -> kres_core::Result<TagPage> {
        let index = (page as usize).saturating_sub(1);
        self.pages
            .get(index)
            .map(|p| TagPage {
                names: p.names.clone(),
                next_page: p.next_page,
            })
            .ok_or_else(|| KresError::UpstreamFetch(format!("no stub tag page {}", page)))
    }
}

// ==================== Fixtures ====================

fn ubuntu_distribution() -> Distribution {
    Distribution {
        name: DistroFamily::Ubuntu,
        versions: vec![DistroVersion {
            name: "focal".to_string(),
            min_version: "5.0".to_string(),
            max_version: "5.10".to_string(),
            base_url: "https://mirror.example/ubuntu/focal".to_string(),
            artifactory_cache: true,
            custom_configs: vec![CustomConfig {
                kernel_name: "5.4".to_string(),
                local_version_suffix: "-dpdk".to_string(),
                properties: [("CONFIG_DPDK".to_string(), "y".to_string())].into(),
            }],
            ..Default::default()
        }],
        parser: vec![r"linux-(\d+\.\d+)\.\d+\.tar\.gz".to_string()],
        required_versions: vec!["5.4-generic".to_string()],
    }
}

fn focal_index() -> &'static str {
    r#"<html><body>
<a href="linux-5.4.180.tar.gz">linux-5.4.180.tar.gz</a>
<a href="linux-5.4.181.tar.gz">linux-5.4.181.tar.gz</a>
<a href="linux-5.8.1.tar.gz">linux-5.8.1.tar.gz</a>
<a href="linux-6.1.0.tar.gz">too new</a>
<a href="readme.html">readme</a>
</body></html>"#
}

// ==================== Index scrape pipeline ====================

#[tokio::test]
async fn test_ubuntu_index_resolution_end_to_end() {
    let http = StubHttp::with(&[("https://mirror.example/ubuntu/focal", focal_index())]);
    let catalog = StubCatalog::default();
    let tags = StubTags::default();
    let cache = KernelCache::new();

    let resolver = Resolver::new(&http, &catalog, &tags, &cache, true);
    let kernels = resolver
        .resolve_distribution(&ubuntu_distribution())
        .await
        .unwrap();

    let names: Vec<String> = kernels.iter().map(|k| k.full_name()).collect();
    assert_eq!(names, vec!["5.4-generic", "5.4-dpdk", "5.8-generic"]);

    let base = &kernels[0];
    assert_eq!(base.distro, DistroFamily::Ubuntu);
    assert_eq!(base.distro_version, "focal");
    assert!(base.required);
    assert_eq!(
        base.files,
        vec![
            FileSource::remote("https://mirror.example/ubuntu/focal/linux-5.4.180.tar.gz"),
            FileSource::remote("https://mirror.example/ubuntu/focal/linux-5.4.181.tar.gz"),
        ]
    );

    let variant = &kernels[1];
    assert_eq!(variant.files, base.files);
    assert!(!variant.required);
    let properties = variant.custom_config.as_ref().unwrap();
    assert_eq!(properties.get("CONFIG_LOCALVERSION").unwrap(), "-dpdk");
    assert_eq!(properties.get("CONFIG_DPDK").unwrap(), "y");
}

#[tokio::test]
async fn test_cache_membership_drives_download_status() {
    let http = StubHttp::with(&[("https://mirror.example/ubuntu/focal", focal_index())]);
    let catalog = StubCatalog::default();
    let tags = StubTags::default();
    let cache = KernelCache::from_entries(&[ArtifactEntry {
        path: "kernels/ubuntu/focal".to_string(),
        name: "linux-5.8.1.tar.gz".to_string(),
        sha256: "feed".to_string(),
    }]);

    let resolver = Resolver::new(&http, &catalog, &tags, &cache, true);
    let kernels = resolver
        .resolve_distribution(&ubuntu_distribution())
        .await
        .unwrap();

    let by_name: HashMap<String, Status> = kernels
        .iter()
        .map(|k| (k.full_name(), k.downloaded))
        .collect();
    assert_eq!(by_name["5.8-generic"], Status::Success);
    assert_eq!(by_name["5.4-generic"], Status::Unknown);
}

#[tokio::test]
async fn test_cache_read_mode_lists_the_mirror() {
    // Same distribution, but base_url already rewritten onto the
    // artifact mirror and sync off: listings come from the mirror and
    // download status stays unknown.
    let mut distribution = ubuntu_distribution();
    distribution.versions[0].base_url = "https://art.example/kernels/ubuntu/focal".to_string();
    let http = StubHttp::with(&[(
        "https://art.example/kernels/ubuntu/focal",
        r#"<a href="linux-5.4.180.tar.gz">f</a>"#,
    )]);
    let catalog = StubCatalog::default();
    let tags = StubTags::default();
    let cache = KernelCache::new();

    let resolver = Resolver::new(&http, &catalog, &tags, &cache, false);
    let kernels = resolver.resolve_distribution(&distribution).await.unwrap();

    assert_eq!(kernels.len(), 2); // base + dpdk variant
    assert_eq!(
        kernels[0].files,
        vec![FileSource::remote(
            "https://art.example/kernels/ubuntu/focal/linux-5.4.180.tar.gz"
        )]
    );
    assert_eq!(kernels[0].downloaded, Status::Unknown);
}

#[tokio::test]
async fn test_required_misses_collected_into_one_error() {
    let http = StubHttp::with(&[("https://mirror.example/ubuntu/focal", focal_index())]);
    let catalog = StubCatalog::default();
    let tags = StubTags::default();
    let cache = KernelCache::new();

    let mut distribution = ubuntu_distribution();
    distribution.required_versions = vec![
        "9.9-generic".to_string(),
        "5.4-generic".to_string(),
        "8.8-generic".to_string(),
    ];

    let resolver = Resolver::new(&http, &catalog, &tags, &cache, true);
    let err = resolver
        .resolve_distribution(&distribution)
        .await
        .unwrap_err();
    match err {
        KresError::RequiredVersionMissing { distro, missing } => {
            assert_eq!(distro, "ubuntu");
            assert_eq!(missing, vec!["9.9-generic", "8.8-generic"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ==================== Tag pipeline ====================

#[tokio::test]
async fn test_minikube_tags_resolution() {
    let distribution = Distribution {
        name: DistroFamily::Minikube,
        versions: vec![DistroVersion {
            name: "latest".to_string(),
            min_version: "1.29".to_string(),
            max_version: "1.31".to_string(),
            base_url: "https://github.com/kubernetes/minikube".to_string(),
            kernel_url: "https://cdn.kernel.org/pub/linux/kernel/v5.x".to_string(),
            defconfig_url: "https://raw.example/minikube/{version}/minikube_defconfig".to_string(),
            kernel_defconfig_url: "https://raw.example/minikube/{version}/linux_defconfig"
                .to_string(),
            ..Default::default()
        }],
        parser: vec![r"^(v\d+\.\d+\.\d+)$".to_string()],
        required_versions: Vec::new(),
    };

    let defconfig = |kernel: &str| {
        format!("BR2_LINUX_KERNEL=y\nBR2_LINUX_KERNEL_CUSTOM_VERSION_VALUE=\"{kernel}\"\n")
    };
    let http = StubHttp::with(&[
        (
            "https://raw.example/minikube/v1.30.0/minikube_defconfig",
            &defconfig("5.10.57"),
        ),
        (
            "https://raw.example/minikube/v1.30.1/minikube_defconfig",
            &defconfig("5.10.57"),
        ),
        (
            "https://raw.example/minikube/v1.29.0/minikube_defconfig",
            &defconfig("5.10.40"),
        ),
    ]);
    let tags = StubTags {
        pages: vec![
            TagPage {
                names: vec!["v1.30.0".to_string(), "v1.30.1".to_string()],
                next_page: Some(2),
            },
            TagPage {
                names: vec!["v1.29.0".to_string(), "v0.9.0".to_string()],
                next_page: None,
            },
        ],
    };
    let catalog = StubCatalog::default();
    let cache = KernelCache::new();

    let resolver = Resolver::new(&http, &catalog, &tags, &cache, true);
    let kernels = resolver.resolve_distribution(&distribution).await.unwrap();

    let names: Vec<&str> = kernels.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["5.10.40", "5.10.57"]);

    let shared = &kernels[1];
    assert_eq!(shared.minikube_versions, vec!["v1.30.0", "v1.30.1"]);
    // One archive plus one defconfig despite two contributing tags.
    assert_eq!(
        shared.files,
        vec![
            FileSource::remote("https://cdn.kernel.org/pub/linux/kernel/v5.x/linux-5.10.57.tar.gz"),
            FileSource::remote("https://raw.example/minikube/v1.30.0/linux_defconfig"),
        ]
    );
    assert_eq!(shared.local_version, "");
}

// ==================== Package catalog pipeline ====================

fn rh_package(name: &str, version: &str, release: &str, checksum: &str) -> RhPackage {
    RhPackage {
        name: name.to_string(),
        version: version.to_string(),
        release: release.to_string(),
        arch: "x86_64".to_string(),
        checksum: checksum.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_rhel_catalog_resolution_with_cache_short_circuit() {
    // 230 packages: pagination spans three pages, so every stride
    // worker serves at least one.
    let mut packages: Vec<RhPackage> = (0..226)
        .map(|i| rh_package(&format!("filler-{i}"), "1.0", "1", ""))
        .collect();
    packages.insert(30, rh_package("kernel-devel", "4.18.0", "305.el8", "cafe"));
    packages.insert(140, rh_package("kernel-devel", "4.18.0", "348.el8", "beef"));
    packages.insert(210, rh_package("kernel-devel", "4.19.0", "100.el8", "f00d"));
    packages.insert(220, rh_package("kernel-headers", "4.18.0", "305.el8", ""));

    let catalog = StubCatalog { packages };
    let http = StubHttp::default();
    let tags = StubTags::default();
    let cache = KernelCache::from_entries(&[ArtifactEntry {
        path: "kernels/rhel/8".to_string(),
        name: "kernel-devel-4.18.0-305.el8.x86_64.rpm".to_string(),
        sha256: "cafe".to_string(),
    }]);

    let distribution = Distribution {
        name: DistroFamily::Rhel,
        versions: vec![DistroVersion {
            name: "8".to_string(),
            min_version: "4".to_string(),
            max_version: "5".to_string(),
            rh_repository: "rhel-8-for-x86_64-baseos-rpms".to_string(),
            artifactory_cache: true,
            ..Default::default()
        }],
        parser: vec![r"kernel-devel-(\d+\.\d+)\.\d+-.+\.rpm".to_string()],
        required_versions: Vec::new(),
    };

    let resolver = Resolver::new(&http, &catalog, &tags, &cache, true);
    let kernels = resolver.resolve_distribution(&distribution).await.unwrap();

    assert_eq!(kernels.len(), 2);
    let four_eighteen = &kernels[0];
    assert_eq!(four_eighteen.name, "4.18");
    assert_eq!(
        four_eighteen.files,
        vec![
            FileSource::AlreadySatisfied {
                filename: "kernel-devel-4.18.0-305.el8.x86_64.rpm".to_string(),
            },
            FileSource::remote("https://signed.example/kernel-devel-4.18.0-348.el8.x86_64.rpm"),
        ]
    );
    let four_nineteen = &kernels[1];
    assert_eq!(four_nineteen.name, "4.19");
    assert_eq!(
        four_nineteen.files,
        vec![FileSource::remote(
            "https://signed.example/kernel-devel-4.19.0-100.el8.x86_64.rpm"
        )]
    );
}
