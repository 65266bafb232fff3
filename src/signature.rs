//! Structural signatures
//!
//! Two elements with the same signature are treated as the same kind of row.
//! A signature only looks at an element's tag, its class list and the
//! tag/classes of its direct children; text is ignored so rows with different
//! contents but identical structure group together.

use std::collections::HashMap;
use std::fmt;

use scraper::ElementRef;

/// Tag plus sorted, deduplicated class list
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shape {
    pub tag: String,
    pub classes: Vec<String>,
}

impl Shape {
    pub fn of(element: ElementRef<'_>) -> Self {
        let mut classes: Vec<String> = element.value().classes().map(String::from).collect();
        classes.sort();
        classes.dedup();
        Self {
            tag: element.value().name().to_string(),
            classes,
        }
    }

    /// Space-joined class list, or the tag name when there are no classes
    pub fn key(&self) -> String {
        if self.classes.is_empty() {
            self.tag.clone()
        } else {
            self.classes.join(" ")
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag)?;
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        Ok(())
    }
}

/// Shape of an element plus the sorted multiset of its direct children's shapes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementSignature {
    pub shape: Shape,
    pub children: Vec<Shape>,
}

impl ElementSignature {
    /// A bare tag with no classes and no element children carries no structure
    pub fn is_trivial(&self) -> bool {
        self.shape.classes.is_empty() && self.children.is_empty()
    }
}

impl fmt::Display for ElementSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.shape)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, "]")
    }
}

pub fn signature(element: ElementRef<'_>) -> ElementSignature {
    let mut children: Vec<Shape> = element
        .children()
        .filter_map(ElementRef::wrap)
        .map(Shape::of)
        .collect();
    children.sort();

    ElementSignature {
        shape: Shape::of(element),
        children,
    }
}

/// Group elements by signature. Groups keep first-seen order, and so do the
/// members inside each group.
pub fn group_by_signature<'a>(
    elements: impl IntoIterator<Item = ElementRef<'a>>,
) -> Vec<(ElementSignature, Vec<ElementRef<'a>>)> {
    let mut index: HashMap<ElementSignature, usize> = HashMap::new();
    let mut groups: Vec<(ElementSignature, Vec<ElementRef<'a>>)> = Vec::new();

    for element in elements {
        let sig = signature(element);
        match index.get(&sig) {
            Some(&i) => groups[i].1.push(element),
            None => {
                index.insert(sig.clone(), groups.len());
                groups.push((sig, vec![element]));
            }
        }
    }

    groups
}

/// Largest group; ties go to the group seen first
pub fn largest_group<'a>(
    groups: Vec<(ElementSignature, Vec<ElementRef<'a>>)>,
) -> Option<(ElementSignature, Vec<ElementRef<'a>>)> {
    let mut best: Option<(ElementSignature, Vec<ElementRef<'a>>)> = None;
    for group in groups {
        let larger = best.as_ref().map_or(true, |(_, members)| group.1.len() > members.len());
        if larger {
            best = Some(group);
        }
    }
    best
}
