//! CSS selectors of the application under test. Kept in one place so a markup change is a
//! one-line fix.

pub const POPOVER: &str = ".MuiPopover-paper";
pub const SELECTED: &str = "Mui-selected";
pub const CHECKED: &str = "Mui-checked";

pub mod home {
    pub const NAV_TABS: &str = r#"header.MuiPaper-root .MuiTabs-flexContainer > a[role="tab"]"#;
    pub const LOGO: &str = "header.MuiPaper-root svg";
    pub const EXPLORE_MAP: &str = r#"div#back-to-top-anchor a[href="/map/information/info"]"#;
    pub const BACK_TO_TOP: &str = r#"button[aria-label="scroll back to top"]"#;
    pub const TOP_ANCHOR: &str = "#back-to-top-anchor";
}

pub mod map {
    pub const CANVAS: &str = r#"canvas[aria-label="Map"]"#;
    pub const ZOOM_LEVEL: &str = r#"[aria-label="Zoom level"]"#;
    pub const ZOOM_IN: &str = r#"button[aria-label="Zoom in"]"#;
    pub const ZOOM_OUT: &str = r#"button[aria-label="Zoom out"]"#;
    pub const TOOLTIP: &str = r#"[role="tooltip"]"#;
    pub const DATASET_BUTTON: &str = r#"button[aria-controls="simple-menu"]"#;
}

pub mod sidebar {
    pub const ROOT: &str = ".MuiGrid-grid-xs-true > .MuiBox-root > div:first-child";
    pub const LOGO: &str = "header svg";
    pub const INFORMATION_TAB: &str = r#"a[aria-label="Information"]"#;
    pub const INSIGHTS_TAB: &str = r#"a[aria-label="Insights"]"#;
    pub const TITLE: &str = "h4.MuiTypography-root";
    pub const PARAGRAPHS: &str = "p.MuiTypography-paragraph";
    pub const THEMATIC_INDICES: &str = r#"a[aria-label="Thematic Indices"]"#;
}

pub mod widgets {
    pub const TYPE_ROW: &str = "div.MuiGrid-item > div.MuiGrid-spacing-xs-1";
    pub const ASSETS_BY_TYPE: &str = r#"[aria-label="HDOT Assets by Type"]"#;
    pub const ASSETS_BY_TYPE_TITLE: &str = r#"h6[title="HDOT Assets by Type"]"#;
    pub const SKELETON: &str = ".MuiSkeleton-wave";
    pub const FACILITIES: &str = r#"section[aria-label="Facilities and Structures"]"#;
    pub const CAPTION: &str = "span.MuiTypography-caption";
    pub const ASSETS_TRIGGER: &str = r#"button[aria-controls="simple-menu"] span"#;
    pub const UNSELECT_ALL: &str = "button.MuiButton-disableElevation";
    pub const UNSELECT_ALL_CAPTION: &str = "button.MuiButton-disableElevation + p";
    pub const DISABLED_TOGGLE: &str = r#"span.MuiIconButton-root[aria-disabled="true"]"#;
    pub const FACILITIES_TOGGLE: &str =
        ".MuiGrid-direction-xs-column + div > div:first-child > li:first-child span.MuiIconButton-root";
}
