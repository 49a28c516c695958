//! Self-installation for Firefox and Chrome.
//!
//! The running executable is copied into a per-user directory and a
//! native-messaging manifest pointing at the copy is written for each
//! browser. On Windows the manifests are also registered under
//! `HKEY_CURRENT_USER`, which is how both browsers find them there.


use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

/// Name browsers use to address the host.
pub const HOST_NAME: &str = "netcode.io";

const MANIFEST_FILE: &str = "netcode.io.json";

const FIREFOX_EXTENSIONS: &[&str] = &[
	"{1af46c0f-6130-426a-b504-1f5b8295a173}",
	"{4279ff57-aad6-4990-bf0b-2010a55ed5d5}",
];

const CHROME_ORIGINS: &[&str] = &[
	"chrome-extension://fkcdbgdmpjenlkecdjadcpnkchaecbpn/",
	"chrome-extension://hpecmifakhimhidjpcpjmihpacijicbd/",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
	Firefox,
	Chrome,
}

/// Native-messaging manifest as read by the browser.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
	pub name: &'a str,
	pub description: String,
	pub path: &'a Path,
	#[serde(rename = "type")]
	pub kind: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub allowed_extensions: Option<&'a [&'a str]>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub allowed_origins: Option<&'a [&'a str]>,
}

impl<'a> Manifest<'a> {
	pub fn new(browser: Browser, binary: &'a Path) -> Self {
		let (allowed_extensions, allowed_origins) = match browser {
			Browser::Firefox => (Some(FIREFOX_EXTENSIONS), None),
			Browser::Chrome => (None, Some(CHROME_ORIGINS)),
		};
		Self {
			name: HOST_NAME,
			description: format!("{HOST_NAME} helper"),
			path: binary,
			kind: "stdio",
			allowed_extensions,
			allowed_origins,
		}
	}
}

/// Where the binary and manifests go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
	pub binary_dir: PathBuf,
	pub firefox_manifest_dir: PathBuf,
	pub chrome_manifest_dir: PathBuf,
}

impl InstallLayout {
	pub fn linux(home: &Path) -> Self {
		Self {
			binary_dir: home.join(".netcode"),
			firefox_manifest_dir: home.join(".mozilla").join("native-messaging-hosts"),
			chrome_manifest_dir: home
				.join(".config")
				.join("google-chrome")
				.join("NativeMessagingHosts"),
		}
	}

	pub fn macos(home: &Path) -> Self {
		let support = home.join("Library").join("Application Support");
		Self {
			binary_dir: home.join(".netcode"),
			firefox_manifest_dir: support.join("Mozilla").join("NativeMessagingHosts"),
			chrome_manifest_dir: support
				.join("Google")
				.join("Chrome")
				.join("NativeMessagingHosts"),
		}
	}

	/// Everything lives under one directory; the registry points into it.
	pub fn windows(binary_dir: PathBuf) -> Self {
		Self {
			firefox_manifest_dir: binary_dir.join("firefox"),
			chrome_manifest_dir: binary_dir.join("chrome"),
			binary_dir,
		}
	}

	/// Layout for the current user on this platform.
	pub fn detect() -> Result<Self> {
		let home = dirs::home_dir().context("Could not determine home directory")?;

		if cfg!(windows) {
			let root = dirs::data_local_dir().unwrap_or(home);
			Ok(Self::windows(root.join(HOST_NAME)))
		} else if cfg!(target_os = "macos") {
			Ok(Self::macos(&home))
		} else {
			Ok(Self::linux(&home))
		}
	}

	pub fn manifest_path(&self, browser: Browser) -> PathBuf {
		let dir = match browser {
			Browser::Firefox => &self.firefox_manifest_dir,
			Browser::Chrome => &self.chrome_manifest_dir,
		};
		dir.join(MANIFEST_FILE)
	}
}

/// Paths written by [`install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
	pub binary: PathBuf,
	pub firefox_manifest: PathBuf,
	pub chrome_manifest: PathBuf,
}

/// Copies `executable` into the layout and writes both manifests.
pub fn install(layout: &InstallLayout, executable: &Path) -> Result<Installation> {
	let binary = copy_binary(&layout.binary_dir, executable)?;
	let firefox_manifest = write_manifest(layout, Browser::Firefox, &binary)?;
	let chrome_manifest = write_manifest(layout, Browser::Chrome, &binary)?;

	Ok(Installation {
		binary,
		firefox_manifest,
		chrome_manifest,
	})
}

/// Installs the running executable for the current user and registers it.
pub fn run() -> Result<Installation> {
	let executable = std::env::current_exe().context("Could not locate the running executable")?;
	let layout = InstallLayout::detect()?;

	let installation = install(&layout, &executable)?;
	register(&installation)?;

	info!(
		target: "nchost.install",
		binary = %installation.binary.display(),
		"installed"
	);
	Ok(installation)
}

fn copy_binary(binary_dir: &Path, executable: &Path) -> Result<PathBuf> {
	fs::create_dir_all(binary_dir)
		.with_context(|| format!("Failed to create {}", binary_dir.display()))?;

	let file_name = executable
		.file_name()
		.with_context(|| format!("{} has no file name", executable.display()))?;
	let binary = binary_dir.join(file_name);

	// Re-running the installed copy must not truncate itself
	if same_file(executable, &binary) {
		debug!(target: "nchost.install", binary = %binary.display(), "already in place");
		return Ok(binary);
	}

	fs::copy(executable, &binary).with_context(|| {
		format!(
			"Failed to copy {} to {}",
			executable.display(),
			binary.display()
		)
	})?;
	Ok(binary)
}

fn same_file(a: &Path, b: &Path) -> bool {
	match (a.canonicalize(), b.canonicalize()) {
		(Ok(a), Ok(b)) => a == b,
		_ => false,
	}
}

fn write_manifest(layout: &InstallLayout, browser: Browser, binary: &Path) -> Result<PathBuf> {
	let path = layout.manifest_path(browser);
	if let Some(dir) = path.parent() {
		fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
	}

	let manifest = Manifest::new(browser, binary);
	let json = serde_json::to_string_pretty(&manifest).context("Failed to render manifest")?;
	fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

	debug!(target: "nchost.install", ?browser, manifest = %path.display(), "manifest written");
	Ok(path)
}

#[cfg(windows)]
fn register(installation: &Installation) -> Result<()> {
	use winreg::RegKey;
	use winreg::enums::HKEY_CURRENT_USER;

	let hkcu = RegKey::predef(HKEY_CURRENT_USER);
	let entries = [
		(
			r"SOFTWARE\Mozilla\NativeMessagingHosts\netcode.io",
			&installation.firefox_manifest,
		),
		(
			r"SOFTWARE\Google\Chrome\NativeMessagingHosts\netcode.io",
			&installation.chrome_manifest,
		),
	];

	for (key_path, manifest) in entries {
		let (key, _) = hkcu
			.create_subkey(key_path)
			.with_context(|| format!(r"Failed to create HKCU\{key_path}"))?;
		key.set_value("", &manifest.display().to_string())
			.with_context(|| format!(r"Failed to set HKCU\{key_path}"))?;
	}
	Ok(())
}

#[cfg(not(windows))]
fn register(_installation: &Installation) -> Result<()> {
	Ok(())
}
