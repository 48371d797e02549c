//! Turn laid-out pages into document items.

use std::collections::HashMap;

use super::layout::{BlockKind, LayoutBlock, PageElement};
use crate::error::Result;
use crate::model::{DocItemLabel, Document, NodeRef, ProvenanceItem};

/// The elements of one page in reading order.
#[derive(Debug, Clone)]
pub struct PageLayout {
    /// 1-based page number
    pub page_no: u32,
    /// Elements in reading order
    pub elements: Vec<PageElement>,
}

/// Append the pages to `doc` in page order.
///
/// Consecutive list items share one list group. Captions are emitted under
/// the nearest table or picture on the same page; a caption with no owner
/// stays in the text flow.
pub fn assemble(doc: &mut Document, pages: Vec<PageLayout>, keep_images: bool) -> Result<()> {
    let flat: Vec<(u32, PageElement)> = pages
        .into_iter()
        .flat_map(|p| {
            let page_no = p.page_no;
            p.elements.into_iter().map(move |e| (page_no, e))
        })
        .collect();

    let captions = assign_captions(&flat);
    let captioned: std::collections::HashSet<usize> =
        captions.values().flatten().copied().collect();

    let mut list: Option<(NodeRef, bool)> = None;
    for (i, (page_no, element)) in flat.iter().enumerate() {
        let page_no = *page_no;
        match element {
            PageElement::Block(block) if block.is_furniture() => {
                let label = match block.kind {
                    BlockKind::PageHeader => DocItemLabel::PageHeader,
                    _ => DocItemLabel::PageFooter,
                };
                doc.add_text(label, block.text.clone(), Some(prov(page_no, block)), None);
            }
            PageElement::Block(_) if captioned.contains(&i) => {}
            PageElement::Block(block) => {
                let p = Some(prov(page_no, block));
                let text = block.text.clone();
                match &block.kind {
                    BlockKind::ListItem { enumerated, marker } => {
                        let group = match &list {
                            Some((group, ordered)) if ordered == enumerated => group.clone(),
                            _ => {
                                let group = doc.add_list_group(*enumerated, None);
                                list = Some((group.clone(), *enumerated));
                                group
                            }
                        };
                        doc.add_list_item(text, *enumerated, Some(marker.clone()), p, Some(&group));
                        continue;
                    }
                    BlockKind::Title => {
                        doc.add_title(text, p, None);
                    }
                    BlockKind::SectionHeader(level) => {
                        doc.add_heading(text, *level, p, None);
                    }
                    BlockKind::Caption => {
                        doc.add_text(DocItemLabel::Caption, text, p, None);
                    }
                    _ => {
                        doc.add_text(DocItemLabel::Text, text, p, None);
                    }
                }
                list = None;
            }
            PageElement::Table(table) => {
                list = None;
                let data = table.to_table_data();
                let r = doc.add_table(data, Some(ProvenanceItem::new(page_no, table.bbox, 0)), None);
                attach_captions(doc, &r, &flat, captions.get(&i))?;
            }
            PageElement::Picture(picture) => {
                list = None;
                let image = picture.image.clone().map(|mut image| {
                    if !keep_images {
                        image.data.clear();
                    }
                    image
                });
                let r = doc.add_picture(
                    image,
                    Some(ProvenanceItem::new(page_no, picture.bbox, 0)),
                    None,
                );
                attach_captions(doc, &r, &flat, captions.get(&i))?;
            }
        }
    }
    Ok(())
}

fn prov(page_no: u32, block: &LayoutBlock) -> ProvenanceItem {
    ProvenanceItem::new(page_no, block.bbox, block.text.chars().count())
}

fn attach_captions(
    doc: &mut Document,
    owner: &NodeRef,
    flat: &[(u32, PageElement)],
    indices: Option<&Vec<usize>>,
) -> Result<()> {
    for &c in indices.into_iter().flatten() {
        if let (page_no, PageElement::Block(block)) = &flat[c] {
            doc.add_caption(owner, block.text.clone(), Some(prov(*page_no, block)))?;
        }
    }
    Ok(())
}

/// Map owner element index to the caption element indices it receives.
///
/// Each caption goes to the closest table or picture on its page. On a tie,
/// table captions prefer the element below them and figure captions the one
/// above.
fn assign_captions(flat: &[(u32, PageElement)]) -> HashMap<usize, Vec<usize>> {
    let owners: Vec<usize> = flat
        .iter()
        .enumerate()
        .filter(|(_, (_, e))| matches!(e, PageElement::Table(_) | PageElement::Picture(_)))
        .map(|(i, _)| i)
        .collect();

    let mut assigned: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, (page_no, element)) in flat.iter().enumerate() {
        let PageElement::Block(block) = element else {
            continue;
        };
        if block.kind != BlockKind::Caption {
            continue;
        }
        let prefers_below = block.text.trim_start().to_lowercase().starts_with("tab");
        let best = owners
            .iter()
            .copied()
            .filter(|&j| flat[j].0 == *page_no)
            .min_by_key(|&j| {
                let below = j > i;
                (i.abs_diff(j), below != prefers_below)
            });
        if let Some(owner) = best {
            assigned.entry(owner).or_default().push(i);
        }
    }
    for captions in assigned.values_mut() {
        captions.sort_unstable();
    }
    assigned
}
