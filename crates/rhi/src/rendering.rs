//! Dynamic-rendering pass descriptors.
//!
//! Builders for the attachment and pass descriptions a recording context
//! consumes. The swapchain's standard pass is the color-only variant
//! produced by [`RenderingConfig::color_only`].

use ash::vk;

/// Description of one color attachment in a dynamic-rendering pass.
#[derive(Clone)]
pub struct ColorAttachment {
    image_view: vk::ImageView,
    layout: vk::ImageLayout,
    load_op: vk::AttachmentLoadOp,
    store_op: vk::AttachmentStoreOp,
    clear_color: [f32; 4],
}

impl ColorAttachment {
    /// Creates a color attachment that clears to opaque black and stores.
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Sets the clear color used when the load op is `CLEAR`.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Loads the existing contents instead of clearing.
    pub fn load(mut self) -> Self {
        self.load_op = vk::AttachmentLoadOp::LOAD;
        self
    }

    /// Builds the Vulkan attachment info for this description.
    pub fn attachment_info(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            })
    }

    #[cfg(test)]
    fn load_op(&self) -> vk::AttachmentLoadOp {
        self.load_op
    }
}

/// A full dynamic-rendering pass description: render area plus attachments.
#[derive(Clone)]
pub struct RenderingConfig {
    extent: vk::Extent2D,
    color_attachments: Vec<ColorAttachment>,
}

impl RenderingConfig {
    /// Creates an empty pass covering the given extent.
    pub fn new(extent: vk::Extent2D) -> Self {
        Self {
            extent,
            color_attachments: Vec::new(),
        }
    }

    /// The standard swapchain pass: a single cleared, stored backbuffer
    /// attachment.
    pub fn color_only(view: vk::ImageView, extent: vk::Extent2D, clear: [f32; 4]) -> Self {
        Self::new(extent).with_color_attachment(ColorAttachment::new(view).with_clear_color(clear))
    }

    /// Adds a color attachment to the pass.
    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// The pass's render area at offset zero.
    pub fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    /// The pass's color attachments.
    pub fn color_attachments(&self) -> &[ColorAttachment] {
        &self.color_attachments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_only_builds_single_cleared_attachment() {
        let extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let config =
            RenderingConfig::color_only(vk::ImageView::null(), extent, [0.1, 0.2, 0.3, 1.0]);

        assert_eq!(config.color_attachments().len(), 1);
        assert_eq!(
            config.color_attachments()[0].load_op(),
            vk::AttachmentLoadOp::CLEAR
        );
        assert_eq!(config.render_area().extent.width, 1280);
        assert_eq!(config.render_area().extent.height, 720);
    }

    #[test]
    fn load_attachment_keeps_contents() {
        let attachment = ColorAttachment::new(vk::ImageView::null()).load();
        assert_eq!(attachment.load_op(), vk::AttachmentLoadOp::LOAD);
    }

    #[test]
    fn attachment_info_carries_clear_color() {
        let attachment =
            ColorAttachment::new(vk::ImageView::null()).with_clear_color([0.5, 0.0, 0.0, 1.0]);
        let info = attachment.attachment_info();
        // SAFETY: the clear value was written as float32 above.
        let color = unsafe { info.clear_value.color.float32 };
        assert_eq!(color, [0.5, 0.0, 0.0, 1.0]);
    }
}
