//! # mdbuild
//!
//! A build-time content pipeline for a Markdown blog. Each post is a
//! directory of Markdown and images; a build turns the whole content root
//! into versioned static files a site can import.
//!
//! # Architecture: Plugin + Host
//!
//! The pipeline is written as a bundler plugin ([`pipeline::MdBuild`]) that
//! speaks a four-hook protocol, and a small host ([`bundle`]) drives it:
//!
//! ```text
//! build_start   scan posts, render Markdown, convert covers, emit files
//! resolve_id    specifier → virtual module id
//! load          virtual module id → generated JS source
//! build_end     barrier: wait for every deferred image conversion
//! ```
//!
//! Generated source refers to emitted files through
//! `import.meta.FILE_URL_<id>` tokens. Only the host knows final file names,
//! so only the host replaces them.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Lists post directories under the content root |
//! | [`naming`] | `<date>--<slug>` directory name convention |
//! | [`front_matter`] | YAML front matter + body split for `index.md` |
//! | [`markdown`] | Markdown → HTML with highlighting, MathML and `<picture>` images |
//! | [`imaging`] | Image decoding, resizing and AVIF/WebP encoding behind a backend trait |
//! | [`cache`] | On-disk, write-through cache of converted images |
//! | [`loader`] | One source image → three emitted assets, now or deferred |
//! | [`tasks`] | Deferred work handles and the build-end barrier |
//! | [`emit`] | Emitted assets and chunks, as seen by the plugin |
//! | [`escape`] | JS string and template literal escaping |
//! | [`codegen`] | Source text of the per-post and metadata modules |
//! | [`registry`] | Virtual modules and metadata path resolution |
//! | [`sitemap`] | `sitemap.xml` |
//! | [`pipeline`] | The plugin: orchestrates everything above |
//! | [`bundle`] | The host: runs the plugin, names, substitutes and publishes files |
//! | [`clean`] | Removes the cache and generated output |
//! | [`config`] | `mdbuild.toml` loading, merging and validation |
//! | [`types`] | Ids and records shared between modules |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Three Variants Per Image
//!
//! Every image is published as AVIF, WebP and a byte-for-byte copy of the
//! original, combined in a `<picture>` element. The original is never
//! re-encoded, so the fallback is exactly what the author committed.
//!
//! ## Eager Work, Lazy Waiting
//!
//! Embedded images start converting on the rayon pool as soon as the
//! Markdown renderer sees them. Their ids go into the generated HTML right
//! away; the content arrives later. Nothing waits for them until build end,
//! and that one barrier is the only completion guarantee.
//!
//! ## Typed Segments, Not Magic Strings
//!
//! Rendered HTML is a list of text and asset-URL segments. Escaping only
//! ever touches text, so an asset URL can never be mangled by it and post
//! content can never forge one.
//!
//! ## Stem-Keyed Image Cache
//!
//! Converted images are cached by file stem and format. Replacing an image
//! with a different one of the same name keeps serving the old conversion
//! until `mdbuild clean` is run.

pub mod bundle;
pub mod cache;
pub mod clean;
pub mod codegen;
pub mod config;
pub mod emit;
pub mod escape;
pub mod front_matter;
pub mod imaging;
pub mod loader;
pub mod markdown;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod registry;
pub mod scan;
pub mod sitemap;
pub mod tasks;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
