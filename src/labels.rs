//! Asset label sheets.
//!
//! Every selected asset is printed once per unit in stock, then the copies are
//! paginated onto the label sheet and rendered as a printable HTML document.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use derive_setters::Setters;
use qrcode::QrCode;
use qrcode::render::svg;
use tracing::{debug, info, trace, warn};

use crate::domain::AVError;
use crate::pagination::{Page, SheetLayout, paginate};

/// What the register knows about an asset that goes onto a label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelAsset {
    pub id: String,
    pub name: String,
    pub department: Option<String>,
    pub quantity: i64,
}

/// One physical label, `copy_index` of `copy_total` for its asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetLabel {
    pub id: String,
    pub name: String,
    pub department: Option<String>,
    pub copy_index: i64,
    pub copy_total: i64,
}

/// Upper bound of labels printed for a single asset.
pub const MAX_LABELS_PER_ASSET: i64 = 1_000;

/// Assets with a non positive quantity produce no labels, larger quantities
/// are capped at [`MAX_LABELS_PER_ASSET`].
pub fn expand_by_quantity(assets: &[LabelAsset]) -> Vec<AssetLabel> {
    let labels: Vec<AssetLabel> = assets
        .iter()
        .filter(|a| a.quantity > 0)
        .flat_map(|asset| {
            let total = if asset.quantity > MAX_LABELS_PER_ASSET {
                warn!(
                    "Asset {} has quantity {}, printing only {MAX_LABELS_PER_ASSET} labels",
                    asset.id, asset.quantity
                );
                MAX_LABELS_PER_ASSET
            } else {
                asset.quantity
            };
            (1..=total).map(move |copy_index| AssetLabel {
                id: asset.id.clone(),
                name: asset.name.clone(),
                department: asset.department.clone(),
                copy_index,
                copy_total: total,
            })
        })
        .collect();
    debug!("Expanded {} assets into {} labels", assets.len(), labels.len());
    labels
}

#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct LabelSheetRenderer {
    pub company: String,
    pub print_date: NaiveDate,
    pub layout: SheetLayout,
    pub title: String,
    /// Labels carry a QR code of `<qr_base_url>/assets/<id>` when set.
    pub qr_base_url: Option<String>,
}

impl LabelSheetRenderer {
    pub fn new(print_date: NaiveDate) -> Self {
        Self {
            company: "COMPANY".to_string(),
            print_date,
            layout: SheetLayout::TOMY_130,
            title: "asset-labels".to_string(),
            qr_base_url: None,
        }
    }

    fn qr_svg(&self, asset_id: &str) -> Option<String> {
        let base = self.qr_base_url.as_deref().map(str::trim).filter(|b| !b.is_empty())?;
        let url = format!("{}/assets/{asset_id}", base.trim_end_matches('/'));
        let code = match QrCode::new(url.as_bytes()) {
            Ok(code) => code,
            Err(e) => {
                warn!("No QR code for {url}: {e}");
                return None;
            }
        };
        let image = code
            .render::<svg::Color>()
            .min_dimensions(96, 96)
            .quiet_zone(false)
            .build();
        // Inline svg, the xml prolog is not allowed inside html.
        image.find("<svg").map(|start| image[start..].to_string())
    }

    fn date_string(&self) -> String {
        self.print_date.format("%d/%m/%Y").to_string()
    }

    pub fn render_html(&self, pages: &[Page<'_, AssetLabel>]) -> String {
        let l = &self.layout;
        let mut out = String::new();
        out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        out.push_str(&format!("<title>{}</title>\n", escape_html(&self.title)));
        out.push_str("<style>\n");
        out.push_str(&format!(
            "@page {{ size: A4; margin: {}mm {}mm; }}\n",
            l.margin_y_mm, l.margin_x_mm
        ));
        out.push_str(
            "@media print { body { -webkit-print-color-adjust: exact; print-color-adjust: exact; } \
             .page { page-break-after: always; } }\n",
        );
        out.push_str(&format!(
            ".sheet {{ display: grid; grid-template-columns: repeat({}, {}mm); grid-auto-rows: {}mm; gap: 0; }}\n",
            l.columns, l.label_width_mm, l.label_height_mm
        ));
        out.push_str(
            ".label { box-sizing: border-box; padding: 4mm 5mm; overflow: hidden; \
             page-break-inside: avoid; font-family: system-ui, sans-serif; }\n\
             .company-name { font-size: 8pt; font-weight: 600; color: #4A5568; text-transform: uppercase; }\n\
             .asset-name { font-size: 16pt; font-weight: 700; color: #1A202C; word-break: break-word; }\n\
             .asset-details { font-size: 8.5pt; color: #718096; }\n\
             .qr-code { float: right; width: 22mm; height: 22mm; }\n\
             .qr-code svg { width: 100%; height: 100%; }\n",
        );
        out.push_str("</style>\n</head>\n<body>\n");

        let company = escape_html(&self.company);
        let date = self.date_string();
        for page in pages {
            out.push_str(&format!("<div class=\"page\" id=\"page-{}\">\n<div class=\"sheet\">\n", page.number));
            for slot in page.slots() {
                match slot {
                    Some(placed) => {
                        let label = placed.entity;
                        let qr = self
                            .qr_svg(&label.id)
                            .map(|svg| format!("<div class=\"qr-code\">{svg}</div>"))
                            .unwrap_or_default();
                        out.push_str(&format!(
                            "<div class=\"label\" data-asset=\"{}\" data-position=\"{}\">{}\
                             <div class=\"company-name\">{}</div>\
                             <div class=\"asset-name\">{}</div>\
                             <div class=\"asset-details\">Department: {}<br>Inventory date: {}<br>No.: <b>{}/{}</b></div>\
                             </div>\n",
                            escape_html(&label.id),
                            placed.position,
                            qr,
                            company,
                            escape_html(&label.name),
                            escape_html(label.department.as_deref().unwrap_or("-")),
                            date,
                            label.copy_index,
                            label.copy_total,
                        ));
                    }
                    None => out.push_str("<div class=\"label\"></div>\n"),
                }
            }
            out.push_str("</div>\n</div>\n");
        }
        out.push_str("</body>\n</html>\n");
        trace!("Rendered {} pages into {} bytes of html", pages.len(), out.len());
        out
    }

    /// Plain text preview, one line per slot.
    pub fn render_text(&self, pages: &[Page<'_, AssetLabel>]) -> String {
        let mut out = String::new();
        let date = self.date_string();
        for page in pages {
            out.push_str(&format!(
                "== Sheet {}/{} ({} of {} slots used) ==\n",
                page.number,
                pages.len(),
                page.len(),
                page.capacity()
            ));
            for (slot_idx, slot) in page.slots().enumerate() {
                let row = slot_idx / self.layout.columns.get() + 1;
                let col = slot_idx % self.layout.columns.get() + 1;
                match slot {
                    Some(placed) => out.push_str(&format!(
                        "[{row},{col}] #{}/{} {} | {} | {} | {}/{}\n",
                        placed.position,
                        placed.total,
                        placed.entity.name,
                        placed.entity.department.as_deref().unwrap_or("-"),
                        date,
                        placed.entity.copy_index,
                        placed.entity.copy_total,
                    )),
                    None => out.push_str(&format!("[{row},{col}] -\n")),
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintSummary {
    pub assets: usize,
    pub labels: usize,
    pub pages: usize,
}

/// Expand, paginate and render `assets`, writing the html sheets to `output`.
pub fn write_label_sheets(
    assets: &[LabelAsset],
    renderer: &LabelSheetRenderer,
    output: &Path,
) -> Result<PrintSummary, AVError> {
    let labels = expand_by_quantity(assets);
    let pages = paginate(&labels, renderer.layout.capacity());
    fs::write(output, renderer.render_html(&pages))?;

    let summary = PrintSummary {
        assets: assets.len(),
        labels: labels.len(),
        pages: pages.len(),
    };
    info!("Wrote {summary:?} to {}", output.display());
    Ok(summary)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
