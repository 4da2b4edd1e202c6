//! Package documents ("packuments") and version manifests.
//!
//! The registry is loose about shapes: `author` may be a bare string or an
//! object, `repository` likewise, and `time` mixes fixed keys with one entry
//! per published version. The types here accept every shape seen in the
//! wild and normalise them.

use std::collections::HashMap;

use serde::Deserialize;

/// A person, given either as `"Name <email> (url)"` or as an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "ContactRepr")]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
    pub url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ContactRepr {
    Name(String),
    Full {
        #[serde(default)]
        name: String,
        email: Option<String>,
        url: Option<String>,
    },
}

impl From<ContactRepr> for Contact {
    fn from(repr: ContactRepr) -> Self {
        match repr {
            ContactRepr::Name(name) => Contact {
                name,
                ..Default::default()
            },
            ContactRepr::Full { name, email, url } => Contact { name, email, url },
        }
    }
}

/// Source repository, given either as a URL string or as an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RepositoryRepr")]
pub struct Repository {
    pub url: String,
    /// `type` in the document, usually `git`.
    pub kind: Option<String>,
    pub directory: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RepositoryRepr {
    Url(String),
    Full {
        #[serde(default)]
        url: String,
        #[serde(rename = "type")]
        kind: Option<String>,
        directory: Option<String>,
    },
}

impl From<RepositoryRepr> for Repository {
    fn from(repr: RepositoryRepr) -> Self {
        match repr {
            RepositoryRepr::Url(url) => Repository {
                url,
                ..Default::default()
            },
            RepositoryRepr::Full {
                url,
                kind,
                directory,
            } => Repository {
                url,
                kind,
                directory,
            },
        }
    }
}

/// Issue tracker, given either as a URL string or as `{url}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "BugsRepr")]
pub struct Bugs {
    pub url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BugsRepr {
    Url(String),
    Full { url: Option<String> },
}

impl From<BugsRepr> for Bugs {
    fn from(repr: BugsRepr) -> Self {
        match repr {
            BugsRepr::Url(url) => Bugs { url: Some(url) },
            BugsRepr::Full { url } => Bugs { url },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Unpublished {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub versions: Vec<String>,
}

/// The `time` object: creation, modification, unpublish info, and the
/// publish time of every version keyed by version string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Time {
    pub created: Option<String>,
    pub modified: Option<String>,
    pub unpublished: Option<Unpublished>,
    #[serde(flatten)]
    pub versions: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Dist {
    #[serde(default)]
    pub tarball: String,
}

/// The manifest of one published version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PackageVersion {
    pub name: String,
    pub version: String,
    pub dist: Dist,
    pub author: Option<Contact>,
    pub scripts: HashMap<String, String>,
    pub repository: Option<Repository>,
    pub homepage: Option<String>,
    pub bugs: Option<Bugs>,
    #[serde(rename = "_npmUser")]
    pub npm_user: Option<Contact>,
}

/// The full registry document for a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Packument {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,
    pub versions: HashMap<String, PackageVersion>,
    pub time: Option<Time>,
    pub homepage: Option<String>,
    pub author: Option<Contact>,
    pub maintainers: Vec<Contact>,
    pub keywords: Vec<String>,
    pub readme: Option<String>,
    pub repository: Option<Repository>,
    /// CouchDB `_rev`, comparable with the revisions in a change event.
    #[serde(rename = "_rev")]
    pub rev: String,
}

const HOLDING_DESCRIPTION: &str = "security holding package";
const HOLDING_VERSION: &str = "0.0.1-security";

impl Packument {
    /// The manifest the `latest` dist-tag points at.
    pub fn latest(&self) -> Option<&PackageVersion> {
        self.dist_tags
            .get("latest")
            .and_then(|version| self.versions.get(version))
    }

    /// Whether npm has replaced the package with a security placeholder
    /// (i.e. the package was taken down).
    pub fn is_holding_package(&self) -> bool {
        self.description.as_deref() == Some(HOLDING_DESCRIPTION)
            && self.versions.len() == 1
            && self.versions.contains_key(HOLDING_VERSION)
    }
}
