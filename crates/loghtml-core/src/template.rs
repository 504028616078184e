//! Document template providers.
//!
//! The template is everything in front of the first log line: doctype,
//! styles, the filter panel and its script, and the opening of the log
//! container. The writer treats it as opaque bytes.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::document::{CONTAINER_END, SENTINEL};

/// Source of the document header written at the top of every new document.
pub trait TemplateProvider: Send + Sync {
    fn header(&self) -> Cow<'_, str>;
}

/// The template shipped with the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplate;

impl TemplateProvider for BuiltinTemplate {
    fn header(&self) -> Cow<'_, str> {
        Cow::Borrowed(BUILTIN_HEADER)
    }
}

/// A template read from disk once at construction.
///
/// A full HTML page is accepted: it is cut at the sentinel comment or at the
/// closing container marker, whichever comes first. An unreadable file falls
/// back to [`BuiltinTemplate`].
#[derive(Debug, Clone)]
pub struct FileTemplate {
    path: PathBuf,
    header: String,
}

impl FileTemplate {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let header = match std::fs::read_to_string(&path) {
            Ok(content) => header_from_page(&content),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Template unreadable, using built-in template");
                BUILTIN_HEADER.to_string()
            }
        };
        Self { path, header }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemplateProvider for FileTemplate {
    fn header(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.header)
    }
}

fn header_from_page(content: &str) -> String {
    let cut = [SENTINEL, CONTAINER_END]
        .iter()
        .filter_map(|marker| content.find(marker))
        .min()
        .unwrap_or(content.len());
    let mut header = content[..cut].trim_end().to_string();
    header.push('\n');
    header
}

const BUILTIN_HEADER: &str = r##"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<title>loghtml</title>
<style>
  body { color: white; background-color: black; font-family: monospace, sans-serif; margin: 0; padding: 0; }
  #logContainer span, #filteredContainer span { display: block; white-space: pre-wrap; margin: 1px 0; }
  .filter-panel { display: none; position: fixed; top: 80px; right: 20px; width: 350px; max-height: 80vh;
    overflow-y: auto; background-color: #2c2c2c; border: 1px solid #444; border-radius: 8px; padding: 15px;
    z-index: 1000; box-shadow: 0 4px 8px rgba(0, 0, 0, 0.5); }
  .filter-tabs { display: flex; margin-bottom: 10px; border-bottom: 1px solid #444; }
  .filter-tab { flex: 1; padding: 8px 15px; cursor: pointer; background: none; border: none; color: #ccc; }
  .filter-tab.active { color: #4caf50; border-bottom: 2px solid #4caf50; }
  .filter-content { display: none; }
  .filter-content.active { display: block; }
  .filter-input { width: 100%; padding: 8px; margin-bottom: 10px; box-sizing: border-box;
    background-color: #1a1a1a; color: white; border: 1px solid #444; border-radius: 4px; }
  .filter-help { font-size: 12px; color: #888; margin-bottom: 10px; }
  .filter-types { max-height: 200px; overflow-y: auto; margin-bottom: 10px; }
  .type-checkbox { display: block; margin: 5px 0; }
  .type-checkbox input { margin-right: 8px; }
  .filter-actions, .filter-footer { display: flex; justify-content: space-between; gap: 10px; margin-top: 10px; }
  .filter-footer { justify-content: flex-end; border-top: 1px solid #444; padding-top: 10px; }
  .filter-action-btn { padding: 8px 16px; font-size: 14px; border: none; border-radius: 6px; cursor: pointer; color: white; }
  .filter-action-btn.apply { background-color: #4caf50; }
  .filter-action-btn.clear { background-color: #f44336; }
  .filter-btn { position: fixed; top: 20px; right: 20px; width: 50px; height: 50px; z-index: 1000;
    display: flex; justify-content: center; align-items: center; cursor: pointer; border: none;
    border-radius: 8px; background-color: rgba(200, 200, 200, 0.8); box-shadow: 0 4px 8px rgba(0, 0, 0, 0.3); }
  .filter-btn:hover { background-color: rgba(180, 180, 180, 0.9); }
  .highlight { background-color: yellow; color: black; padding: 0 2px; }
</style>
</head>
<body>
<div id="filterPanel" class="filter-panel">
  <div class="filter-tabs">
    <button class="filter-tab active" data-tab="text">Text filter</button>
    <button class="filter-tab" data-tab="type">Filter by tag</button>
  </div>
  <div id="textFilter" class="filter-content active">
    <input type="text" id="textFilterInput" class="filter-input" placeholder="Type to filter (AND, OR supported)..." />
    <div class="filter-help">Combine terms with AND / OR, e.g. "error AND database", "warning OR info".</div>
  </div>
  <div id="typeFilter" class="filter-content">
    <div id="typeFilterList" class="filter-types"></div>
    <div class="filter-actions">
      <button id="selectAllTypes" class="filter-action-btn apply">Select all</button>
      <button id="deselectAllTypes" class="filter-action-btn clear">Clear selection</button>
    </div>
  </div>
  <div class="filter-footer">
    <button id="applyFiltersBtn" class="filter-action-btn apply">Apply</button>
    <button id="clearFiltersBtn" class="filter-action-btn clear">Reset</button>
  </div>
</div>
<button id="filterBtn" class="filter-btn" title="Filter">
  <svg width="24" height="24" viewBox="0 0 24 24" fill="none" xmlns="http://www.w3.org/2000/svg">
    <path d="M3 4H21L14 12V20L10 22V12L3 4Z" stroke="#333333" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"/>
  </svg>
</button>
<div id="filteredContainer" style="display: none"></div>
<script>
  let usedTags = [];
  let activeFilters = { text: "", types: [] };

  function logLines() {
    return document.querySelectorAll("#logContainer [data-tags]");
  }

  function extractTags() {
    const found = new Set();
    logLines().forEach((line) => {
      line.getAttribute("data-tags").split(",").forEach((t) => {
        if (t.trim()) found.add(t.trim());
      });
    });
    usedTags = Array.from(found).sort();
  }

  function renderTagList() {
    const list = document.getElementById("typeFilterList");
    const checked = new Set(activeFilters.types);
    list.innerHTML = "";
    usedTags.forEach((tag) => {
      const label = document.createElement("label");
      label.className = "type-checkbox";
      const box = document.createElement("input");
      box.type = "checkbox";
      box.value = tag;
      box.checked = checked.has(tag);
      label.appendChild(box);
      label.appendChild(document.createTextNode(tag));
      list.appendChild(label);
    });
  }

  function parseTextFilter(raw) {
    const lower = raw.trim().toLowerCase();
    if (!lower) return { terms: [], all: false };
    if (/\sand\s/i.test(lower)) {
      return { terms: lower.split(/\sand\s/i).map((s) => s.trim()).filter(Boolean), all: true };
    }
    return { terms: lower.split(/\sor\s/i).map((s) => s.trim()).filter(Boolean), all: false };
  }

  function showOriginal() {
    document.getElementById("logContainer").style.display = "block";
    const filtered = document.getElementById("filteredContainer");
    filtered.style.display = "none";
    filtered.innerHTML = "";
  }

  function applyFilters() {
    const text = parseTextFilter(activeFilters.text || "");
    const types = activeFilters.types || [];
    if (text.terms.length === 0 && types.length === 0) {
      showOriginal();
      return;
    }
    const filtered = document.getElementById("filteredContainer");
    filtered.innerHTML = "";
    logLines().forEach((line) => {
      const content = (line.textContent || "").toLowerCase();
      const lineTags = line.getAttribute("data-tags").split(",").map((t) => t.trim());
      const textMatch = text.terms.length === 0 ||
        (text.all ? text.terms.every((t) => content.includes(t)) : text.terms.some((t) => content.includes(t)));
      const typeMatch = types.length === 0 || types.some((t) => lineTags.includes(t));
      if (!textMatch || !typeMatch) return;
      const copy = line.cloneNode(true);
      copy.style.color = line.parentElement.getAttribute("color") || "";
      text.terms.forEach((term) => {
        const pattern = new RegExp(term.replace(/[.*+?^${}()|[\]\\]/g, "\\$&"), "gi");
        copy.innerHTML = copy.innerHTML.replace(pattern, (m) => `<span class="highlight">${m}</span>`);
      });
      filtered.appendChild(copy);
    });
    document.getElementById("logContainer").style.display = "none";
    filtered.style.display = "block";
  }

  document.addEventListener("DOMContentLoaded", function () {
    const panel = document.getElementById("filterPanel");
    const button = document.getElementById("filterBtn");
    const input = document.getElementById("textFilterInput");

    document.querySelectorAll(".filter-tab").forEach((tab) => {
      tab.addEventListener("click", function () {
        document.querySelectorAll(".filter-tab").forEach((t) => t.classList.remove("active"));
        document.querySelectorAll(".filter-content").forEach((c) => c.classList.remove("active"));
        this.classList.add("active");
        document.getElementById(this.getAttribute("data-tab") + "Filter").classList.add("active");
      });
    });

    button.addEventListener("click", function () {
      if (panel.style.display === "block") {
        panel.style.display = "none";
        return;
      }
      extractTags();
      renderTagList();
      panel.style.display = "block";
      input.focus();
    });

    document.getElementById("applyFiltersBtn").addEventListener("click", function () {
      activeFilters.text = input.value;
      activeFilters.types = Array.from(document.querySelectorAll("#typeFilterList input:checked")).map((b) => b.value);
      applyFilters();
    });

    document.getElementById("clearFiltersBtn").addEventListener("click", function () {
      input.value = "";
      activeFilters = { text: "", types: [] };
      renderTagList();
      showOriginal();
    });

    document.getElementById("selectAllTypes").addEventListener("click", function () {
      document.querySelectorAll("#typeFilterList input").forEach((b) => (b.checked = true));
    });

    document.getElementById("deselectAllTypes").addEventListener("click", function () {
      document.querySelectorAll("#typeFilterList input").forEach((b) => (b.checked = false));
    });

    input.addEventListener("keypress", function (e) {
      if (e.key === "Enter") document.getElementById("applyFiltersBtn").click();
    });

    document.addEventListener("click", function (e) {
      if (!panel.contains(e.target) && !button.contains(e.target)) panel.style.display = "none";
    });
  });
</script>
<div id="logContainer">
"##;
